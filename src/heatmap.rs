use anyhow::{bail, Context, Result};
use prediction_engine::HeatmapMatrix;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::process::Command;
use tracing::{debug, warn};

const OUTPUT_FILE: &str = "heatmap.png";

/// Runs the external plotting script. Each render gets its own working
/// directory so concurrent renders never overwrite each other's image.
pub struct HeatmapRenderer {
    python: String,
    script: PathBuf,
    work_root: PathBuf,
    seq: AtomicU64,
}

impl HeatmapRenderer {
    /// Fails when the script does not exist.
    pub fn new(python: impl Into<String>, script: &Path, work_root: impl Into<PathBuf>) -> Result<Self> {
        let script = std::fs::canonicalize(script)
            .with_context(|| format!("heatmap script {}", script.display()))?;
        Ok(Self {
            python: python.into(),
            script,
            work_root: work_root.into(),
            seq: AtomicU64::new(0),
        })
    }

    /// Path of the rendered image. Hand it to `discard` once sent.
    pub async fn render(&self, matrix: &HeatmapMatrix) -> Result<PathBuf> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let dir = self.work_root.join(format!("render-{}-{n}", std::process::id()));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create {}", dir.display()))?;

        let output = Command::new(&self.python)
            .arg(&self.script)
            .arg(format!("--heroes={}", matrix.heroes_arg()))
            .arg(format!("--winrates={}", matrix.winrates_arg()))
            .current_dir(&dir)
            .output()
            .await
            .with_context(|| format!("spawn {}", self.python))?;

        if !output.status.success() {
            discard(&dir.join(OUTPUT_FILE)).await;
            bail!(
                "heatmap script exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "heatmap rendered");

        let image = dir.join(OUTPUT_FILE);
        if !tokio::fs::try_exists(&image).await.unwrap_or(false) {
            discard(&image).await;
            bail!("heatmap script produced no {OUTPUT_FILE}");
        }
        Ok(image)
    }
}

/// Removes a rendered image and its per-render directory.
pub async fn discard(image: &Path) {
    if let Some(dir) = image.parent() {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!("could not remove {}: {e}", dir.display());
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn matrix() -> HeatmapMatrix {
        HeatmapMatrix {
            heroes: vec!["Axe".into(), "Lion".into()],
            rows: vec![vec![48.5]],
        }
    }

    #[tokio::test]
    async fn passes_matrix_args_and_returns_image() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake.sh");
        std::fs::write(&script, "echo \"$1 $2\" > heatmap.png\n").unwrap();

        let renderer = HeatmapRenderer::new("sh", &script, dir.path().join("work")).unwrap();
        let image = renderer.render(&matrix()).await.unwrap();

        let written = std::fs::read_to_string(&image).unwrap();
        assert_eq!(written.trim(), "--heroes=Axe,Lion --winrates=48.50");

        discard(&image).await;
        assert!(!image.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn failing_script_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo nope >&2\nexit 3\n").unwrap();

        let renderer = HeatmapRenderer::new("sh", &script, dir.path().join("work")).unwrap();
        let err = renderer.render(&matrix()).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn missing_script_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HeatmapRenderer::new("sh", &dir.path().join("absent.py"), dir.path()).is_err());
    }
}
