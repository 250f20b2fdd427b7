use std::sync::Arc;

use arc_swap::ArcSwap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    Node,
    Mesh,
    Material,
    Postprocess,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadProgress {
    pub stage: LoadStage,
    /// Fraction in `[0, 1]`, or `None` while the stage has no measurable progress.
    pub progress: Option<f32>,
}

/// Progress shared between the loading thread and whoever displays it.
/// Cloning hands out another view of the same cell.
#[derive(Clone)]
pub struct ProgressCell {
    current: Arc<ArcSwap<LoadProgress>>,
}

impl Default for ProgressCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCell {
    pub fn new() -> Self {
        let init = LoadProgress {
            stage: LoadStage::Node,
            progress: None,
        };
        Self {
            current: Arc::new(ArcSwap::from_pointee(init)),
        }
    }

    pub fn publish(&self, stage: LoadStage, progress: Option<f32>) {
        let progress = progress.map(|p| p.clamp(0.0, 1.0));
        self.current.store(Arc::new(LoadProgress { stage, progress }));
    }

    pub fn load(&self) -> LoadProgress {
        **self.current.load()
    }
}

/// Publishes to an optional cell, logging each stage change once.
pub(crate) fn report(cell: Option<&ProgressCell>, stage: LoadStage, progress: Option<f32>) {
    if let Some(cell) = cell {
        if cell.load().stage != stage {
            log::info!("load stage: {stage:?}");
        }
        cell.publish(stage, progress);
    }
}
