//! Ghostscript adapter against shell-script stand-ins.
//!
//! Everything runs inside one test: writing an executable and spawning it
//! while another test thread forks can fail with ETXTBSY.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tightfit_core::{
    CancelHandle, CancelToken, CandidateDescriptor, CandidateParams, EncodeError, Encoder,
    PresetProfile,
};
use tightfit_encoders::GhostscriptEncoder;

const WRITE_OUTPUT: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
done
echo "$@" > "$(dirname "$0")/args.txt"
head -c 4096 /dev/zero > "$out"
"#;

const TINY_OUTPUT: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    -sOutputFile=*) out="${arg#-sOutputFile=}" ;;
  esac
done
printf 'tiny' > "$out"
"#;

const EXIT_FAILURE: &str = "#!/bin/sh\necho 'Error: /syntaxerror in --token--' >&2\nexit 1\n";

const HANG: &str = "#!/bin/sh\nexec sleep 30\n";

fn install(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn ebook() -> CandidateDescriptor {
    CandidateDescriptor::new(
        "ebook-120",
        CandidateParams::Document {
            preset: PresetProfile::Ebook,
            image_resolution_dpi: 120,
            auto_rotate: false,
        },
        7,
    )
}

fn encoder(program: &Path, scratch: &Path, timeout: Duration) -> GhostscriptEncoder {
    GhostscriptEncoder::new(program.display().to_string(), timeout, 512, scratch)
}

fn scratch_is_empty(scratch: &Path) -> bool {
    std::fs::read_dir(scratch).map(|d| d.count() == 0).unwrap_or(true)
}

#[tokio::test]
async fn ghostscript_stand_ins() {
    let bin = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let input = b"%PDF-1.4\n% stand-in input\n".to_vec();

    let ok = install(bin.path(), "gs-ok", WRITE_OUTPUT);
    let tiny = install(bin.path(), "gs-tiny", TINY_OUTPUT);
    let fail = install(bin.path(), "gs-fail", EXIT_FAILURE);
    let hang = install(bin.path(), "gs-hang", HANG);

    // Success: output is read back and the preset reaches the command line.
    let result = encoder(&ok, scratch.path(), Duration::from_secs(10))
        .invoke(&input, &ebook(), &CancelToken::never())
        .await;
    let artifact = result.artifact().expect("stand-in should succeed");
    assert_eq!(artifact.size_bytes(), 4096);
    assert_eq!(artifact.mime_type(), "application/pdf");
    let args = std::fs::read_to_string(bin.path().join("args.txt")).unwrap();
    assert!(args.contains("-dPDFSETTINGS=/ebook"));
    assert!(args.contains("-dColorImageResolution=120"));
    assert!(scratch_is_empty(scratch.path()));

    // Output under the corruption floor.
    let result = encoder(&tiny, scratch.path(), Duration::from_secs(10))
        .invoke(&input, &ebook(), &CancelToken::never())
        .await;
    assert!(matches!(result.error(), Some(EncodeError::CandidateFailed { .. })));
    assert!(scratch_is_empty(scratch.path()));

    // Non-zero exit carries stderr in the reason.
    let result = encoder(&fail, scratch.path(), Duration::from_secs(10))
        .invoke(&input, &ebook(), &CancelToken::never())
        .await;
    let err = result.error().expect("non-zero exit should fail");
    assert!(!err.aborts_selection());
    assert!(err.to_string().contains("syntaxerror"));
    assert!(scratch_is_empty(scratch.path()));

    // Timeout kills the child and does not abort the sequence.
    let started = Instant::now();
    let result = encoder(&hang, scratch.path(), Duration::from_millis(300))
        .invoke(&input, &ebook(), &CancelToken::never())
        .await;
    assert!(matches!(result.error(), Some(EncodeError::TimedOut { .. })));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(scratch_is_empty(scratch.path()));

    // Cancellation mid-run.
    let (handle, token) = CancelHandle::new();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();
    });
    let started = Instant::now();
    let result = encoder(&hang, scratch.path(), Duration::from_secs(30))
        .invoke(&input, &ebook(), &token)
        .await;
    canceller.await.unwrap();
    assert_eq!(result.error(), Some(&EncodeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(scratch_is_empty(scratch.path()));

    // Version probe through the stand-in.
    let version = encoder(&install(bin.path(), "gs-version", "#!/bin/sh\necho 10.02.1\n"), scratch.path(), Duration::from_secs(5))
        .probe_version()
        .await
        .unwrap();
    assert_eq!(version, "10.02.1");
}
