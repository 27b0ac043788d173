//! Business logic services

pub mod clock;
pub mod duty_schedule;
pub mod geo;
pub mod geocoding;
pub mod logbook;
pub mod nominatim;
pub mod polyline;
pub mod routing;
pub mod segments;
pub mod trip_planner;
