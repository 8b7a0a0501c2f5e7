/*!
Utilities for constructing the file names used by the database.

Table files and write-ahead logs are named by their file number so that the name alone
identifies the file's place in the database's history.
*/

use std::path::PathBuf;

/// Constructs paths for database files under a single database directory.
pub(crate) struct FileNameHandler {
    /// The database directory all files live under.
    db_path: PathBuf,
}

/// Crate-only methods
impl FileNameHandler {
    /// Create a new [`FileNameHandler`] rooted at `db_path`.
    pub(crate) fn new(db_path: &str) -> Self {
        Self {
            db_path: PathBuf::from(db_path),
        }
    }

    /// The path to the table file with the specified file number.
    pub(crate) fn get_table_file_path(&self, file_number: u64) -> PathBuf {
        self.db_path.join(format!("{file_number:06}.sst"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_embed_the_zero_padded_file_number() {
        let handler = FileNameHandler::new("/data/db");

        assert_eq!(
            handler.get_table_file_path(42),
            PathBuf::from("/data/db/000042.sst")
        );
    }
}
