// Data Seeder - demonstration content for a fresh console

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::{
    core::now_rfc3339,
    error::AppResult,
    infrastructure::{Collection, DocumentStore},
    models::{Conference, KeynoteInfo, Program},
    services::{ProgramEditor, ProgramForm},
};

pub const SAMPLE_PROGRAM_TITLE: &str = "Artificial Intelligence and Healthcare";

fn talk(title: &str, presenter: &str, affiliation: &str, start: &str, end: &str) -> Conference {
    Conference {
        title: title.to_string(),
        presenter: presenter.to_string(),
        affiliation: affiliation.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        ..Default::default()
    }
}

/// The opening session of the 2025 edition, with its keynote.
pub fn sample_program_form() -> ProgramForm {
    let mut form = ProgramForm {
        title: SAMPLE_PROGRAM_TITLE.to_string(),
        date: "2025-12-08".to_string(),
        start: "09:30".to_string(),
        end: "11:15".to_string(),
        room: "Main Auditorium".to_string(),
        keynote: KeynoteInfo {
            name: "Pr Nawres Khlifa".to_string(),
            affiliation: "El Manar University, Tunisia".to_string(),
            bio: "Expert in AI and healthcare innovation.".to_string(),
            image: String::new(),
        },
        keynote_description: "How AI is reshaping diagnosis and care pathways.".to_string(),
        keynote_has_conference: true,
        ..Default::default()
    };
    form.keynote_conference.start = "09:30".to_string();
    form.keynote_conference.end = "10:15".to_string();

    form.add_chair("Pr Nawres Khlifa");
    form.add_chair("Pr Faiza Belala");
    form.add_conference(talk(
        "CoMediC: Empowering Collaborative and Participatory Medical Multimodal Data Collection Projects",
        "Wafia Abada, Abdelkrim Bouraoumol, and Asma Ayari",
        "Constantine",
        "10:15",
        "10:35",
    ));
    form.add_conference(talk(
        "A Novel Ensemble Learning Approach for Diabetes Prediction in Imbalanced Datasets",
        "Djalila Boughareb, Said Bouteldja, and Hamid Seridi",
        "Guelma",
        "10:35",
        "10:55",
    ));
    form.add_conference(talk(
        "Detection of Atherosclerosis using Deep Learning",
        "Zahia Guessoum, Juliet C Moso, Stephane Cormier and Mohamed Tahar Bennai",
        "France",
        "10:55",
        "11:15",
    ));
    form
}

/// Save the sample program through the editor unless a program with the
/// same title is already loaded. Returns the program either way.
pub async fn seed_sample_program(editor: &mut ProgramEditor) -> AppResult<Program> {
    editor.load().await?;
    if let Some(existing) = editor.programs().iter().find(|p| p.title == SAMPLE_PROGRAM_TITLE) {
        info!("Sample program already present ({})", existing.id);
        return Ok(existing.clone());
    }

    *editor.form_mut() = sample_program_form();
    let program = editor.submit().await?;
    info!("Seeded sample program {} with {} talks", program.id, program.conferences.len());
    Ok(program)
}

/// A few attendee ratings per talk so the statistics pages have content.
pub async fn seed_sample_ratings(store: &Arc<dyn DocumentStore>, program: &Program) -> AppResult<usize> {
    let scores: [(u8, u8, Option<&str>); 3] = [
        (5, 4, Some("Clear and well structured.")),
        (4, 4, None),
        (3, 5, Some("Great topic, slides were dense.")),
    ];

    let mut written = 0;
    for conference in &program.conferences {
        let key = conference
            .stable_key()
            .unwrap_or_else(|| conference.derived_key(&program.date));
        for (index, (presenter, presentation, comment)) in scores.iter().enumerate() {
            let mut rating = json!({
                "presentationId": key.as_str(),
                "conferenceTitle": conference.title,
                "presenter": conference.presenter,
                "startTime": conference.start,
                "date": program.date,
                "userId": format!("sample-user-{}", index + 1),
                "userEmail": format!("attendee{}@example.com", index + 1),
                "presenterRating": presenter,
                "presentationRating": presentation,
                "ratedAt": now_rfc3339(),
            });
            if let (Some(text), Value::Object(map)) = (comment, &mut rating) {
                map.insert("comment".to_string(), json!(text));
            }
            if let Value::Object(data) = rating {
                store.add(Collection::Ratings, data).await?;
                written += 1;
            }
        }
    }
    info!("Seeded {} sample ratings", written);
    Ok(written)
}
