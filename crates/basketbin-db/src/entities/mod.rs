//! Database entities

pub mod basket;
pub mod captured_request;
pub mod cascade_job;

pub use basket::Entity as Basket;
pub use captured_request::Entity as CapturedRequest;
pub use cascade_job::Entity as CascadeJob;

pub mod prelude {
    pub use super::basket::Entity as Basket;
    pub use super::captured_request::Entity as CapturedRequest;
    pub use super::cascade_job::Entity as CascadeJob;
}
