// Typed models over the stored documents
// Every model is built through `from_document`, which never fails on shape problems

pub mod fields;
pub mod notification;
pub mod program;
pub mod rating;
pub mod speaker;
pub mod user;

pub use fields::FieldReader;
pub use notification::Notification;
pub use program::{Conference, KeynoteInfo, Program, ProgramType};
pub use rating::{PresentationAnalytics, Rating, RatingDistribution};
pub use speaker::KeynoteSpeaker;
pub use user::{AuthUser, MergedUser, UserProfile};
