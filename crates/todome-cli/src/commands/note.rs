use std::path::Path;

use chrono::Utc;
use serde_json::json;
use todome_core::models::Note;

use crate::commands::common::{
    format_note_lines, normalize_tags, normalize_text, note_to_list_item, open_session,
    resolve_title, NoteListItem, Session,
};
use crate::error::CliError;

pub async fn add_note(
    session: &Session,
    title: &[String],
    body: Option<&str>,
    tags: &[String],
) -> Result<Note, CliError> {
    let mut note = Note::new(session.user_id.as_str(), resolve_title(title)?);
    if let Some(body) = body.and_then(normalize_text) {
        note.content = Some(json!({
            "type": "doc",
            "content": [{
                "type": "paragraph",
                "content": [{ "type": "text", "text": body }],
            }],
        }));
        note.plain_text = Some(body);
    }
    note.tags = normalize_tags(tags);

    session.repo.create(&note).await?;
    Ok(note)
}

pub async fn list_notes(
    session: &Session,
    tag: Option<&str>,
    refresh: bool,
) -> Result<Vec<Note>, CliError> {
    if refresh {
        session.go_online()?;
        session.repo.load::<Note>(&session.user_id).await?;
    }

    let store = session.repo.store();
    let notes = match tag.and_then(normalize_text) {
        Some(tag) => {
            let tag = tag.trim_start_matches('#').to_lowercase();
            store.list_by_tag::<Note>(&session.user_id, &tag).await?
        }
        None => store.list_by_owner::<Note>(&session.user_id).await?,
    };
    Ok(notes)
}

pub async fn run_note_add(
    title: &[String],
    body: Option<&str>,
    tags: &[String],
    user: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let note = add_note(&session, title, body, tags).await?;
    session.flush().await;
    println!("{}", note.id);
    Ok(())
}

pub async fn run_note_list(
    tag: Option<&str>,
    refresh: bool,
    as_json: bool,
    user: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let notes = list_notes(&session, tag, refresh).await?;

    if as_json {
        let now = Utc::now();
        let items = notes
            .iter()
            .map(|note| note_to_list_item(note, now))
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if notes.is_empty() {
        println!("No notes.");
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }
    Ok(())
}
