use crate::query::features::FeatureVector;

/// The three outcomes the dock-availability model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockAvailability {
    NoDocks,
    SomeDocks,
    DocksAvailable,
}

impl DockAvailability {
    /// User-facing sentence shown for a prediction.
    pub fn message(&self) -> &'static str {
        match self {
            DockAvailability::NoDocks => "There would be no available docks",
            DockAvailability::SomeDocks => "There might be some docks available",
            DockAvailability::DocksAvailable => "There will be docks available",
        }
    }
}

/// Seam for the trained availability model.
pub trait DockClassifier {
    fn classify(&self, features: &FeatureVector) -> DockAvailability;
}

/// Baseline classifier on the share of docks currently free.
///
/// | Free share          | Result           |
/// |---------------------|------------------|
/// | no free docks       | `NoDocks`        |
/// | < `plenty`          | `SomeDocks`      |
/// | >= `plenty`         | `DocksAvailable` |
#[derive(Debug, Clone, Copy)]
pub struct ThresholdClassifier {
    pub plenty: f64,
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self { plenty: 0.25 }
    }
}

impl DockClassifier for ThresholdClassifier {
    fn classify(&self, features: &FeatureVector) -> DockAvailability {
        if features.live_capacity == 0 || features.docks == 0 {
            return DockAvailability::NoDocks;
        }

        match features.live_capacity as f64 / features.docks as f64 {
            share if share >= self.plenty => DockAvailability::DocksAvailable,
            _ => DockAvailability::SomeDocks,
        }
    }
}
