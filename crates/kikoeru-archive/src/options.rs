use std::path::{Path, PathBuf};

/// Settings shared by every extraction a [`NativeExtractor`](crate::NativeExtractor) runs.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub unrar_program: PathBuf,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            unrar_program: PathBuf::from("unrar"),
        }
    }
}

impl ExtractOptions {
    pub fn unrar_program(mut self, program: impl AsRef<Path>) -> Self {
        self.unrar_program = program.as_ref().to_path_buf();
        self
    }
}
