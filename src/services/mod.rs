// Services - console operations over the document store

pub mod auth_service;
pub mod database_admin_service;
pub mod export;
pub mod keynote_speaker_service;
pub mod program_editor;
pub mod program_service;
pub mod statistics_service;
pub mod user_directory;
pub mod user_service;

pub use auth_service::{AuthService, LoginOutcome, LoginSource};
pub use database_admin_service::{ClearReport, DatabaseAdminService, DatabaseStats, CLEAR_ALL_PHRASE};
pub use export::{ExportFile, ExportFormat};
pub use keynote_speaker_service::{KeynoteSpeakerService, SpeakerInput, SpeakerSort};
pub use program_editor::ProgramEditor;
pub use program_service::{KeynoteConferenceInput, ProgramForm, ProgramService};
pub use statistics_service::{StatisticsService, UserCounts};
pub use user_directory::{DirectorySnapshot, UserDirectory};
pub use user_service::{merge_users, UserService};
