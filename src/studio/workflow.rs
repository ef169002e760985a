use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use crate::studio::backend::ShotModel;
use crate::studio::codec::UploadedImage;
use crate::studio::error::{
    StudioError, StudioResult, ANALYSIS_FAILED_MESSAGE, GENERATION_FAILED_MESSAGE,
    MISSING_IDEAS_MESSAGE, MISSING_IMAGE_MESSAGE,
};
use crate::studio::settings::{AspectRatio, RenderSettings, StylePreset};
use crate::utils::timing::{complete_phase_timer, start_phase_timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Initial,
    Analyzing,
    IdeasReady,
    Generating,
    ImagesReady,
    Error,
}

impl WorkflowState {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Initial => "initial",
            WorkflowState::Analyzing => "analyzing",
            WorkflowState::IdeasReady => "ideas_ready",
            WorkflowState::Generating => "generating",
            WorkflowState::ImagesReady => "images_ready",
            WorkflowState::Error => "error",
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, WorkflowState::Analyzing | WorkflowState::Generating)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated image and the position of the idea that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedShot {
    pub idea_index: usize,
    pub data_uri: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub epoch: u64,
    pub image: UploadedImage,
}

/// Everything one generation batch needs, captured when the batch starts.
#[derive(Debug, Clone)]
pub struct GenerationBatch {
    pub epoch: u64,
    pub image: UploadedImage,
    pub ideas: Vec<String>,
    pub settings: RenderSettings,
}

#[derive(Debug)]
pub enum WorkflowEvent {
    Uploaded(UploadedImage),
    AspectRatioChanged(AspectRatio),
    StyleChanged(StylePreset),
    AnalyzeRequested,
    AnalysisSucceeded { epoch: u64, ideas: Vec<String> },
    AnalysisFailed { epoch: u64 },
    GenerateRequested,
    GenerationSucceeded { epoch: u64, results: Vec<Option<String>> },
    GenerationFailed { epoch: u64 },
}

#[derive(Debug)]
pub enum Transition {
    Applied,
    StartAnalysis(AnalysisJob),
    StartGeneration(GenerationBatch),
    /// A completion from an analysis or batch that has since been superseded.
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct Workflow {
    state: WorkflowState,
    image: Option<UploadedImage>,
    ideas: Vec<String>,
    shots: Vec<GeneratedShot>,
    settings: RenderSettings,
    error: Option<String>,
    epoch: u64,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn ideas(&self) -> &[String] {
        &self.ideas
    }

    pub fn shots(&self) -> &[GeneratedShot] {
        &self.shots
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn apply(&mut self, event: WorkflowEvent) -> StudioResult<Transition> {
        match event {
            WorkflowEvent::Uploaded(image) => {
                self.epoch += 1;
                self.image = Some(image);
                self.state = WorkflowState::Initial;
                self.ideas.clear();
                self.shots.clear();
                self.error = None;
                Ok(Transition::Applied)
            }
            WorkflowEvent::AspectRatioChanged(aspect_ratio) => {
                self.ensure_idle("change render settings")?;
                self.settings.aspect_ratio = aspect_ratio;
                Ok(Transition::Applied)
            }
            WorkflowEvent::StyleChanged(style) => {
                self.ensure_idle("change render settings")?;
                self.settings.style = style;
                Ok(Transition::Applied)
            }
            WorkflowEvent::AnalyzeRequested => {
                self.ensure_idle("analyze")?;
                let Some(image) = self.image.clone() else {
                    return Err(self.fail_precondition(MISSING_IMAGE_MESSAGE));
                };
                self.epoch += 1;
                self.state = WorkflowState::Analyzing;
                self.ideas.clear();
                self.shots.clear();
                self.error = None;
                Ok(Transition::StartAnalysis(AnalysisJob {
                    epoch: self.epoch,
                    image,
                }))
            }
            WorkflowEvent::AnalysisSucceeded { epoch, ideas } => {
                if !self.is_current(epoch, WorkflowState::Analyzing) {
                    return Ok(Transition::Stale);
                }
                self.ideas = ideas;
                self.state = WorkflowState::IdeasReady;
                Ok(Transition::Applied)
            }
            WorkflowEvent::AnalysisFailed { epoch } => {
                if !self.is_current(epoch, WorkflowState::Analyzing) {
                    return Ok(Transition::Stale);
                }
                self.state = WorkflowState::Error;
                self.error = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                Ok(Transition::Applied)
            }
            WorkflowEvent::GenerateRequested => {
                self.ensure_idle("generate")?;
                let image = match &self.image {
                    Some(image) if !self.ideas.is_empty() => image.clone(),
                    _ => return Err(self.fail_precondition(MISSING_IDEAS_MESSAGE)),
                };
                self.epoch += 1;
                self.state = WorkflowState::Generating;
                self.shots.clear();
                self.error = None;
                Ok(Transition::StartGeneration(GenerationBatch {
                    epoch: self.epoch,
                    image,
                    ideas: self.ideas.clone(),
                    settings: self.settings,
                }))
            }
            WorkflowEvent::GenerationSucceeded { epoch, results } => {
                if !self.is_current(epoch, WorkflowState::Generating) {
                    return Ok(Transition::Stale);
                }
                self.shots = results
                    .into_iter()
                    .enumerate()
                    .filter_map(|(idea_index, result)| {
                        result.map(|data_uri| GeneratedShot {
                            idea_index,
                            data_uri,
                        })
                    })
                    .collect();
                self.state = WorkflowState::ImagesReady;
                Ok(Transition::Applied)
            }
            WorkflowEvent::GenerationFailed { epoch } => {
                if !self.is_current(epoch, WorkflowState::Generating) {
                    return Ok(Transition::Stale);
                }
                self.shots.clear();
                self.state = WorkflowState::Error;
                self.error = Some(GENERATION_FAILED_MESSAGE.to_string());
                Ok(Transition::Applied)
            }
        }
    }

    fn is_current(&self, epoch: u64, expected: WorkflowState) -> bool {
        self.epoch == epoch && self.state == expected
    }

    fn ensure_idle(&self, action: &str) -> StudioResult<()> {
        if self.state.is_busy() {
            return Err(StudioError::Precondition(format!(
                "Cannot {action} while {} is in progress.",
                self.state
            )));
        }
        Ok(())
    }

    fn fail_precondition(&mut self, message: &str) -> StudioError {
        self.state = WorkflowState::Error;
        self.error = Some(message.to_string());
        StudioError::Precondition(message.to_string())
    }
}

/// Drives a [`Workflow`] against a [`ShotModel`]. The workflow lock is only
/// held for transitions, never across a model call.
pub struct Studio<M> {
    model: M,
    workflow: Arc<Mutex<Workflow>>,
}

impl<M: ShotModel> Studio<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            workflow: Arc::new(Mutex::new(Workflow::new())),
        }
    }

    pub fn snapshot(&self) -> Workflow {
        self.workflow.lock().clone()
    }

    fn dispatch(&self, event: WorkflowEvent) -> StudioResult<Transition> {
        self.workflow.lock().apply(event)
    }

    pub fn upload(&self, image: UploadedImage) {
        info!(
            "New product image ({}, {} bytes); clearing ideas and shots",
            image.mime_type(),
            image.bytes().len()
        );
        // Uploads are accepted in every state.
        let _ = self.dispatch(WorkflowEvent::Uploaded(image));
    }

    pub fn set_aspect_ratio(&self, aspect_ratio: AspectRatio) -> StudioResult<()> {
        self.dispatch(WorkflowEvent::AspectRatioChanged(aspect_ratio))
            .map(|_| ())
    }

    pub fn set_style(&self, style: StylePreset) -> StudioResult<()> {
        self.dispatch(WorkflowEvent::StyleChanged(style)).map(|_| ())
    }

    pub async fn analyze(&self) -> StudioResult<Vec<String>> {
        let Transition::StartAnalysis(job) = self.dispatch(WorkflowEvent::AnalyzeRequested)?
        else {
            return Err(StudioError::Precondition(
                "Analysis could not be started.".to_string(),
            ));
        };

        info!("Generating creative ideas...");
        let mut timer = start_phase_timer("analyze", job.epoch);
        let result = self.model.analyze(&job.image).await;
        let event = match &result {
            Ok(ideas) => WorkflowEvent::AnalysisSucceeded {
                epoch: job.epoch,
                ideas: ideas.clone(),
            },
            Err(err) => {
                error!("Analysis failed: {err:#}");
                WorkflowEvent::AnalysisFailed { epoch: job.epoch }
            }
        };

        let transition = self.dispatch(event)?;
        let status = if result.is_ok() { "success" } else { "error" };
        complete_phase_timer(&mut timer, status, result.as_ref().err().map(|e| e.to_string()));

        if matches!(transition, Transition::Stale) {
            warn!("Discarding analysis result from superseded epoch {}", job.epoch);
            return Err(StudioError::Superseded { epoch: job.epoch });
        }
        result
    }

    /// Issues one request per idea concurrently. Any rejection fails the whole
    /// batch and completed results are discarded.
    pub async fn generate(&self) -> StudioResult<Vec<GeneratedShot>> {
        let Transition::StartGeneration(batch) = self.dispatch(WorkflowEvent::GenerateRequested)?
        else {
            return Err(StudioError::Precondition(
                "Generation could not be started.".to_string(),
            ));
        };

        info!(
            "Creating {} product shots ({}, {} style)...",
            batch.ideas.len(),
            batch.settings.aspect_ratio.prompt_term(),
            batch.settings.style
        );
        let mut timer = start_phase_timer("generate", batch.epoch);
        let requests = batch
            .ideas
            .iter()
            .map(|idea| self.model.generate(&batch.image, idea, batch.settings));
        let result = try_join_all(requests).await;

        let (event, failure) = match result {
            Ok(results) => {
                let dropped = results.iter().filter(|result| result.is_none()).count();
                if dropped > 0 {
                    warn!("{dropped} idea(s) produced no image and were dropped");
                }
                (
                    WorkflowEvent::GenerationSucceeded {
                        epoch: batch.epoch,
                        results,
                    },
                    None,
                )
            }
            Err(err) => {
                error!("Generation batch failed: {err:#}");
                (
                    WorkflowEvent::GenerationFailed { epoch: batch.epoch },
                    Some(err),
                )
            }
        };

        // Shots are read under the same guard as the completion so a racing
        // upload cannot empty them in between.
        let (transition, shots) = {
            let mut workflow = self.workflow.lock();
            let transition = workflow.apply(event)?;
            (transition, workflow.shots().to_vec())
        };
        let status = if failure.is_none() { "success" } else { "error" };
        complete_phase_timer(&mut timer, status, failure.as_ref().map(|e| e.to_string()));

        if matches!(transition, Transition::Stale) {
            warn!("Discarding generation batch from superseded epoch {}", batch.epoch);
            return Err(StudioError::Superseded { epoch: batch.epoch });
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(shots),
        }
    }
}
