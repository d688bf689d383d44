/// Расчётные модели планировщика

pub mod alerts;
pub mod capacity;
pub mod department;
pub mod distribution;
pub mod forecasting;
pub mod quality;
pub mod weekly;

pub use alerts::{alert_stats, with_resolution, AlertContext, AlertGenerator};
pub use capacity::{capacity, demand, load_pct, status_by_load};
pub use department::{compute_metrics, MetricsCalculator, MetricsInput};
pub use distribution::HoursClassifier;
pub use forecasting::{ForecastingModel, LoggedHours};
pub use quality::QualityScorer;
pub use weekly::{WeeklyAggregator, WeeklySeries};
