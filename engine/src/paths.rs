//! Path resolution for a single transfer.

use std::path::Path;
use crate::error::EngineError;
use crate::model::{Job, SourceKind, TransferPaths, LABEL_DATA_DIR, PIX_DIR};

/// Compute the source, destination and mirror directories for `job`.
///
/// Pure path arithmetic; nothing here touches the disk. The destination is
/// shared by every job and is not namespaced by job name.
pub fn resolve_paths(job: &Job, default_root: &Path, destination_root: &Path) -> TransferPaths {
    let src_job_folder = match &job.source {
        SourceKind::AdHoc { path } => path.clone(),
        SourceKind::Default => default_root.join(&job.name),
    };

    let mirror_dest = (job.is_ad_hoc() && job.mirror_requested)
        .then(|| default_root.join(&job.name));

    TransferPaths {
        src_label_data: src_job_folder.join(LABEL_DATA_DIR),
        src_pix: src_job_folder.join(PIX_DIR),
        src_job_folder,
        dst_label_data: destination_root.join(LABEL_DATA_DIR),
        dst_pix: destination_root.join(PIX_DIR),
        mirror_dest,
    }
}

/// Check that both source subfolders exist.
pub fn validate_sources(paths: &TransferPaths) -> Result<(), EngineError> {
    for (dir, what) in [(&paths.src_label_data, LABEL_DATA_DIR), (&paths.src_pix, PIX_DIR)] {
        if !dir.is_dir() {
            return Err(EngineError::PathNotFound {
                path: paths.src_job_folder.clone(),
                what: what.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use crate::error::ErrorKind;
    use crate::test_support::write_file;

    #[test]
    fn test_resolve_default_job() {
        let job = Job::default_source("Kitchen-42");
        let paths = resolve_paths(&job, Path::new("/jobs"), Path::new("/cad"));

        assert_eq!(paths.src_job_folder, PathBuf::from("/jobs/Kitchen-42"));
        assert_eq!(paths.src_label_data, PathBuf::from("/jobs/Kitchen-42/Label Data"));
        assert_eq!(paths.src_pix, PathBuf::from("/jobs/Kitchen-42/Pix"));
        assert_eq!(paths.dst_label_data, PathBuf::from("/cad/Label Data"));
        assert_eq!(paths.dst_pix, PathBuf::from("/cad/Pix"));
        assert_eq!(paths.mirror_dest, None);
    }

    #[test]
    fn test_resolve_ad_hoc_job_with_mirror() {
        let job = Job::ad_hoc("Kitchen-42", "/media/usb/Kitchen-42", true);
        let paths = resolve_paths(&job, Path::new("/jobs"), Path::new("/cad"));

        assert_eq!(paths.src_job_folder, PathBuf::from("/media/usb/Kitchen-42"));
        assert_eq!(paths.src_label_data, PathBuf::from("/media/usb/Kitchen-42/Label Data"));
        assert_eq!(paths.dst_pix, PathBuf::from("/cad/Pix"));
        assert_eq!(paths.mirror_dest, Some(PathBuf::from("/jobs/Kitchen-42")));
    }

    #[test]
    fn test_resolve_ad_hoc_job_without_mirror() {
        let job = Job::ad_hoc("Kitchen-42", "/media/usb/Kitchen-42", false);
        let paths = resolve_paths(&job, Path::new("/jobs"), Path::new("/cad"));
        assert_eq!(paths.mirror_dest, None);
    }

    #[test]
    fn test_validate_reports_missing_pix() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        write_file(&temp_dir.path().join("JobA/Label Data/a.lbl"), "a");
        let paths = resolve_paths(&Job::default_source("JobA"), temp_dir.path(), Path::new("/cad"));

        let err = validate_sources(&paths).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PathNotFound);
        assert!(err.to_string().starts_with("Pix folder not found"));
    }

    #[test]
    fn test_validate_accepts_complete_job() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        crate::test_support::make_job_folder(&temp_dir.path().join("JobA"));
        let paths = resolve_paths(&Job::default_source("JobA"), temp_dir.path(), Path::new("/cad"));

        validate_sources(&paths).expect("Complete job should validate");
    }
}
