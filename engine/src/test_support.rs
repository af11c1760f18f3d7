//! Fixtures shared by the unit tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use crate::model::{LABEL_DATA_DIR, PIX_DIR};

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, contents).expect("Failed to write file");
}

/// Relative path -> contents for every entry under `root`.
/// Directories map to `None` so empty directories are compared too.
pub fn snapshot(root: &Path) -> BTreeMap<String, Option<Vec<u8>>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Option<Vec<u8>>>) {
        for entry in fs::read_dir(dir).expect("Failed to read dir") {
            let path = entry.expect("Failed to read entry").path();
            let rel = path
                .strip_prefix(root)
                .expect("Entry outside root")
                .to_string_lossy()
                .replace('\\', "/");
            if path.is_dir() {
                out.insert(rel, None);
                walk(root, &path, out);
            } else {
                out.insert(rel, Some(fs::read(&path).expect("Failed to read file")));
            }
        }
    }

    let mut out = BTreeMap::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out
}

/// Create a job folder with one file in each of its two subfolders.
pub fn make_job_folder(folder: &Path) {
    write_file(&folder.join(LABEL_DATA_DIR).join("panel.lbl"), "panel v1");
    write_file(&folder.join(PIX_DIR).join("front.jpg"), "front");
}
