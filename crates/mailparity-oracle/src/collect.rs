//! Run oracles and decode their output into result sets.

use futures::future::try_join_all;

use mailparity_core::{obs, OracleResultSet};

use crate::catalog::OracleConfig;
use crate::error::Result;
use crate::runner::{OracleOutput, OracleRunner};

/// Pure `(oracle, stdout) -> result set` decoder.
pub type Decoder<R> = fn(&str, &str) -> OracleResultSet<R>;

/// Run one oracle over `files` with lifecycle logging.
///
/// Returns `None` when the oracle is optional and its root is absent.
pub async fn run_oracle(config: &OracleConfig, files: &[String]) -> Result<Option<OracleOutput>> {
    if config.should_skip() {
        obs::emit_oracle_skipped(&config.name, "root not found");
        return Ok(None);
    }

    obs::emit_oracle_started(&config.name, files.len());
    match OracleRunner::invoke(config, files).await {
        Ok(output) => {
            if !output.stderr.is_empty() {
                tracing::debug!(oracle = %config.name, stderr = %output.stderr, "oracle stderr");
            }
            Ok(Some(output))
        }
        Err(e) => {
            obs::emit_oracle_failed(&config.name, &e);
            Err(e)
        }
    }
}

/// Run one oracle and decode its rows. A skipped oracle yields an empty set.
pub async fn collect<R>(
    config: &OracleConfig,
    files: &[String],
    decode: Decoder<R>,
) -> Result<OracleResultSet<R>> {
    let Some(output) = run_oracle(config, files).await? else {
        return Ok(OracleResultSet::empty(config.name.clone()));
    };
    let set = decode(&config.name, &output.stdout);
    obs::emit_oracle_finished(&config.name, output.duration_ms, set.len());
    Ok(set)
}

/// Collect every configured oracle, in `configs` order.
///
/// With `parallel` the invocations overlap; the first failure aborts the run
/// either way.
pub async fn collect_all<R>(
    configs: &[OracleConfig],
    files: &[String],
    decode: Decoder<R>,
    parallel: bool,
) -> Result<Vec<OracleResultSet<R>>> {
    if parallel {
        return try_join_all(configs.iter().map(|c| collect(c, files, decode))).await;
    }

    let mut sets = Vec::with_capacity(configs.len());
    for config in configs {
        sets.push(collect(config, files, decode).await?);
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_pst_probe;

    fn fake(name: &str, script: &str) -> OracleConfig {
        OracleConfig::custom(
            name,
            vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "sh".to_string(),
            ],
            10,
        )
    }

    #[tokio::test]
    async fn test_skipped_oracle_yields_empty_set() {
        let config = fake("viewer", "exit 1")
            .in_dir("/nonexistent/mailparity/viewer")
            .optional();
        let set = collect(&config, &["/a.pst".to_string()], decode_pst_probe)
            .await
            .expect("skip");
        assert!(set.is_empty());
        assert_eq!(set.oracle(), "viewer");
    }

    #[tokio::test]
    async fn test_collect_all_preserves_order() {
        let configs = vec![
            fake("slow", r#"sleep 1; for f in "$@"; do echo "ROW|$f|1|1|1"; done"#),
            fake("fast", r#"for f in "$@"; do echo "ROW|$f|2|2|2"; done"#),
        ];
        let files = vec!["/a.pst".to_string()];
        for parallel in [false, true] {
            let sets = collect_all(&configs, &files, decode_pst_probe, parallel)
                .await
                .expect("collect");
            let names: Vec<&str> = sets.iter().map(|s| s.oracle()).collect();
            assert_eq!(names, vec!["slow", "fast"]);
            assert_eq!(sets[1].len(), 1);
        }
    }

    #[tokio::test]
    async fn test_one_crash_aborts_the_run() {
        let configs = vec![
            fake("ok", r#"for f in "$@"; do echo "ROW|$f|1|1|1"; done"#),
            fake("crash", "echo partial; exit 2"),
        ];
        let err = collect_all(&configs, &["/a.pst".to_string()], decode_pst_probe, true)
            .await
            .expect_err("crash");
        assert!(err.to_string().contains("crash"));
    }
}
