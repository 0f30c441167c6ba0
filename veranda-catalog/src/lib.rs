pub mod availability;
pub mod property;

pub use availability::{nights_between, ranges_overlap};
pub use property::{NewProperty, Property, PropertyFilter, PropertyRepository, PropertyStatus};
