/// Модуль подготовки входных данных

pub mod calendar;
pub mod filters;
pub mod period;
pub mod what_if;

pub use calendar::ProductionCalendar;
pub use filters::{FilterSet, Filters, UserRestrictions};
pub use period::{Period, PeriodBounds};
pub use what_if::{MergedEntities, WhatIfOverlay, WhatIfScenario};
