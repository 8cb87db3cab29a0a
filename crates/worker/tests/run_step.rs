#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;

use scriptstep_core::scripting::sink::CollectingSink;
use scriptstep_core::{ScriptAction, Status};
use scriptstep_worker::config::WorkerConfig;
use scriptstep_worker::job::JobFile;
use tokio_util::sync::CancellationToken;

fn config(basedir: PathBuf, step_file: PathBuf) -> WorkerConfig {
    WorkerConfig {
        basedir,
        working_dir: None,
        export_port: 8089,
        default_shell: "/bin/sh".into(),
        step_file,
        legacy_key: None,
    }
}

#[tokio::test]
async fn job_file_runs_to_success() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let scripts = tempfile::tempdir().expect("create script dir");
    let step_file = dir.path().join("step.json");
    std::fs::write(
        &step_file,
        r#"{
            "parameters": [
                {"name": "script", "value": "echo \"$APP_NAME on $CDS_EXPORT_PORT\"\necho build $CDS_BUILD_ID >&2\n", "type": "text"},
                {"name": "app.name", "value": "billing"},
                {"name": "cds.key.deploy.priv", "value": "TOP-SECRET", "type": "key"}
            ],
            "build_variables": [{"name": "cds.build.id", "value": "42"}]
        }"#,
    )
    .expect("write job");

    let config = config(scripts.path().to_path_buf(), step_file.clone());
    let job = JobFile::load(&step_file).await.expect("load job");
    let sink = Arc::new(CollectingSink::new());

    let outcome = ScriptAction::default()
        .run(job.into_request(&config), sink.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.status, Status::Success);
    let mut lines = sink.lines();
    lines.sort();
    assert_eq!(lines, vec!["billing on 8089", "build 42"]);
    assert!(std::fs::read_dir(scripts.path()).expect("read dir").next().is_none());
}

#[tokio::test]
async fn failing_job_reports_reason_last() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let step_file = dir.path().join("step.json");
    std::fs::write(
        &step_file,
        r##"{"parameters": [{"name": "script", "value": "#!/bin/sh\necho oops >&2\nexit 7\n"}]}"##,
    )
    .expect("write job");

    let config = config(dir.path().to_path_buf(), step_file.clone());
    let job = JobFile::load(&step_file).await.expect("load job");
    let sink = Arc::new(CollectingSink::new());

    let outcome = ScriptAction::default()
        .run(job.into_request(&config), sink.clone(), CancellationToken::new())
        .await;

    assert_eq!(outcome.status, Status::Fail);
    assert!(outcome.reason.contains('7'));
    assert_eq!(sink.lines(), vec!["oops".to_string(), outcome.reason.clone()]);
}
