//! Writing snapshots to the output directory.

use std::path::Path;

use kiln_model::Content;

use crate::error::CompileError;
use crate::listener::FileAction;

/// Writes `content` to `output_dir/rel`, leaving the file untouched when it
/// already holds the same bytes.
pub(crate) fn write_snapshot(
    output_dir: &Path,
    rel: &Path,
    content: &Content,
) -> Result<FileAction, CompileError> {
    let path = output_dir.join(rel);
    let io = |source| CompileError::Io {
        path: path.clone(),
        source,
    };

    let bytes = match content {
        Content::Textual(text) => text.as_bytes().to_vec(),
        Content::Binary(source) => std::fs::read(source).map_err(|e| CompileError::Io {
            path: source.clone(),
            source: e,
        })?,
    };

    let action = match std::fs::read(&path) {
        Ok(existing) if existing == bytes => return Ok(FileAction::Identical),
        Ok(_) => FileAction::Updated,
        Err(_) => FileAction::Created,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(&path, &bytes).map_err(io)?;
    tracing::debug!(path = %path.display(), action = action.label(), "wrote output");
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_update_identical() {
        let dir = tempfile::tempdir().unwrap();
        let rel = Path::new("blog/post.html");
        let write = |text: &str| write_snapshot(dir.path(), rel, &Content::from(text)).unwrap();

        assert_eq!(write("one"), FileAction::Created);
        assert_eq!(write("one"), FileAction::Identical);
        assert_eq!(write("two"), FileAction::Updated);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(rel)).unwrap(),
            "two"
        );
    }

    #[test]
    fn binary_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("logo.png");
        std::fs::write(&source, [0u8, 159, 146, 150]).unwrap();
        let out = dir.path().join("output");
        let action = write_snapshot(&out, Path::new("logo.png"), &Content::Binary(source)).unwrap();
        assert_eq!(action, FileAction::Created);
        assert_eq!(
            std::fs::read(out.join("logo.png")).unwrap(),
            vec![0u8, 159, 146, 150]
        );
    }
}
