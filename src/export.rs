use crate::models::Note;

/// A file ready to hand to the browser for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

fn file_stem(video_id: &str) -> String {
    let clean: String = video_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if clean.is_empty() {
        "notes".to_string()
    } else {
        format!("notes-{clean}")
    }
}

/// The note body as a Markdown file, titled with the note's title.
pub fn markdown_export(note: &Note) -> ExportFile {
    let body = if note.notes.trim_start().starts_with('#') {
        note.notes.clone()
    } else {
        format!("# {}\n\n{}", note.title, note.notes)
    };
    ExportFile {
        file_name: format!("{}.md", file_stem(&note.video_id)),
        mime: "text/markdown",
        bytes: body.into_bytes(),
    }
}

/// Wraps the PDF the backend rendered.
pub fn pdf_export(video_id: &str, bytes: Vec<u8>) -> ExportFile {
    ExportFile { file_name: format!("{}.pdf", file_stem(video_id)), mime: "application/pdf", bytes }
}
