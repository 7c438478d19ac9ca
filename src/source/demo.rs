//! Built-in sample data so the dashboard can run without a recorded session.

use super::replay::{RecordedPipeline, Recording};
use crate::model::{
    ActionState, BuildDetail, BuildEnvironment, BuildPhase, ExecutionSummary, LogChunk,
    LogLocation, PipelineDetail, ProjectInfo, StageState, Tags, VpcConfig,
};
use chrono::{DateTime, TimeZone, Utc};

pub const DEMO_PIPELINE: &str = "demo-pipeline";
pub const FAILING_PIPELINE: &str = "prod-api";
pub const WAITING_PIPELINE: &str = "nightly-reports";
pub const IDLE_PIPELINE: &str = "legacy-app";

pub const DEMO_BUILD: &str = "demo-build:0f1e2d3c";
pub const FAILED_BUILD: &str = "prod-api-tests:9a8b7c6d";
pub const LOG_GROUP: &str = "/aws/codebuild/demo-build";
pub const LOG_STREAM: &str = "0f1e2d3c";
const FAILED_LOG_STREAM: &str = "9a8b7c6d";

const INLINE_BUILDSPEC: &str = "version: 0.2\n\nphases:\n  install:\n    runtime-versions:\n      rust: latest\n  build:\n    commands:\n      - cargo build --release\n      - cargo test\nartifacts:\n  files:\n    - target/release/demo\n";

fn at(hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2024, 5, 14, hour, minute, 0).single()
}

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn execution(id: &str, status: &str, trigger: &str, hour: u32) -> Option<ExecutionSummary> {
    Some(ExecutionSummary {
        id: id.to_string(),
        status: status.to_string(),
        trigger: trigger.to_string(),
        last_update: at(hour, 0),
    })
}

fn action(
    name: &str,
    provider: &str,
    category: &str,
    status: Option<&str>,
    changed: Option<DateTime<Utc>>,
    external: Option<&str>,
) -> ActionState {
    ActionState {
        name: name.to_string(),
        provider: provider.to_string(),
        category: category.to_string(),
        status: status.map(str::to_string),
        last_status_change: changed,
        external_execution_id: external.map(str::to_string),
    }
}

fn stage(name: &str, status: Option<&str>, actions: Vec<ActionState>) -> StageState {
    StageState {
        name: name.to_string(),
        inbound_transition_enabled: true,
        latest_status: status.map(str::to_string),
        actions,
    }
}

fn source_stage(hour: u32) -> StageState {
    stage(
        "Source",
        Some("Succeeded"),
        vec![action(
            "Checkout",
            "CodeCommit",
            "Source",
            Some("Succeeded"),
            at(hour, 1),
            Some("4c1d9e2b"),
        )],
    )
}

fn pipelines() -> Vec<(String, RecordedPipeline)> {
    let demo = RecordedPipeline {
        execution: execution(
            "e1a2b3c4",
            "Succeeded",
            "arn:aws:sts::123456789012:assumed-role/Developer/alice",
            9,
        ),
        tags: tags(&[("team", "platform"), ("env", "dev")]),
        detail: Some(PipelineDetail {
            name: DEMO_PIPELINE.to_string(),
            stages: vec![
                source_stage(9),
                stage(
                    "Build",
                    Some("Succeeded"),
                    vec![action(
                        "Compile",
                        "CodeBuild",
                        "Build",
                        Some("Succeeded"),
                        at(9, 7),
                        Some(DEMO_BUILD),
                    )],
                ),
                stage(
                    "Deploy",
                    Some("Succeeded"),
                    vec![action(
                        "Publish",
                        "S3",
                        "Deploy",
                        Some("Succeeded"),
                        at(9, 9),
                        None,
                    )],
                ),
            ],
        }),
    };

    let failing = RecordedPipeline {
        execution: execution(
            "f5e6d7c8",
            "Failed",
            "arn:aws:sts::123456789012:assumed-role/codebuild-role/AWSCodeBuild-7f3e",
            11,
        ),
        tags: tags(&[("team", "platform"), ("env", "prod")]),
        detail: Some(PipelineDetail {
            name: FAILING_PIPELINE.to_string(),
            stages: vec![
                source_stage(11),
                stage(
                    "Test",
                    Some("Failed"),
                    vec![
                        action(
                            "Unit",
                            "CodeBuild",
                            "Test",
                            Some("Succeeded"),
                            at(11, 5),
                            Some("prod-api-unit:1b2c3d4e"),
                        ),
                        action(
                            "Integration",
                            "CodeBuild",
                            "Test",
                            Some("Failed"),
                            at(11, 12),
                            Some(FAILED_BUILD),
                        ),
                    ],
                ),
                stage(
                    "Deploy",
                    None,
                    vec![action("Release", "ECS", "Deploy", None, None, None)],
                ),
            ],
        }),
    };

    let waiting = RecordedPipeline {
        execution: execution(
            "a9b8c7d6",
            "InProgress",
            "arn:aws:events:eu-west-1:123456789012:rule/nightly",
            2,
        ),
        tags: tags(&[("team", "data")]),
        detail: Some(PipelineDetail {
            name: WAITING_PIPELINE.to_string(),
            stages: vec![
                source_stage(2),
                stage(
                    "Approve",
                    Some("InProgress"),
                    vec![action(
                        "SignOff",
                        "Manual",
                        "Approval",
                        Some("InProgress"),
                        None,
                        None,
                    )],
                ),
                stage(
                    "Report",
                    None,
                    vec![action("Render", "CodeBuild", "Build", None, None, None)],
                ),
            ],
        }),
    };

    let idle = RecordedPipeline {
        execution: None,
        tags: Tags::new(),
        detail: Some(PipelineDetail {
            name: IDLE_PIPELINE.to_string(),
            stages: vec![stage(
                "Source",
                None,
                vec![action("Checkout", "GitHub", "Source", None, None, None)],
            )],
        }),
    };

    vec![
        (DEMO_PIPELINE.to_string(), demo),
        (FAILING_PIPELINE.to_string(), failing),
        (WAITING_PIPELINE.to_string(), waiting),
        (IDLE_PIPELINE.to_string(), idle),
    ]
}

fn phases(statuses: &[(&str, &str)]) -> Vec<BuildPhase> {
    statuses
        .iter()
        .map(|(kind, status)| BuildPhase {
            kind: kind.to_string(),
            status: status.to_string(),
        })
        .collect()
}

fn environment() -> BuildEnvironment {
    BuildEnvironment {
        compute_type: "BUILD_GENERAL1_SMALL".to_string(),
        image: "aws/codebuild/standard:7.0".to_string(),
        kind: "LINUX_CONTAINER".to_string(),
        privileged_mode: false,
        variables: vec![
            ("RUST_LOG".to_string(), "info".to_string()),
            ("STAGE".to_string(), "ci".to_string()),
        ],
    }
}

fn builds() -> Vec<BuildDetail> {
    vec![
        BuildDetail {
            id: DEMO_BUILD.to_string(),
            status: "SUCCEEDED".to_string(),
            project: ProjectInfo {
                name: "demo-build".to_string(),
                description: "Compiles and tests the demo service".to_string(),
                buildspec: INLINE_BUILDSPEC.to_string(),
                tags: tags(&[("team", "platform")]),
            },
            source_type: "CODEPIPELINE".to_string(),
            environment: environment(),
            logs: LogLocation {
                group: LOG_GROUP.to_string(),
                stream: Some(LOG_STREAM.to_string()),
            },
            vpc: None,
            phases: phases(&[
                ("SUBMITTED", "SUCCEEDED"),
                ("PROVISIONING", "SUCCEEDED"),
                ("BUILD", "SUCCEEDED"),
                ("COMPLETED", ""),
            ]),
        },
        BuildDetail {
            id: FAILED_BUILD.to_string(),
            status: "FAILED".to_string(),
            project: ProjectInfo {
                name: "prod-api-tests".to_string(),
                description: "Integration tests against the staging stack".to_string(),
                buildspec: "buildspec-integration.yml".to_string(),
                tags: tags(&[("team", "platform"), ("env", "prod")]),
            },
            source_type: "CODEPIPELINE".to_string(),
            environment: environment(),
            logs: LogLocation {
                group: "/aws/codebuild/prod-api-tests".to_string(),
                stream: Some(FAILED_LOG_STREAM.to_string()),
            },
            vpc: Some(VpcConfig {
                vpc_id: "vpc-0a1b2c3d".to_string(),
                subnets: vec!["subnet-11aa".to_string(), "subnet-22bb".to_string()],
                security_groups: vec!["sg-33cc".to_string()],
            }),
            phases: phases(&[
                ("SUBMITTED", "SUCCEEDED"),
                ("PROVISIONING", "SUCCEEDED"),
                ("BUILD", "FAILED"),
                ("COMPLETED", ""),
            ]),
        },
    ]
}

fn lines(text: &[&str]) -> Vec<String> {
    text.iter().map(|l| l.to_string()).collect()
}

fn logs() -> Vec<(String, Vec<LogChunk>)> {
    vec![
        (
            LOG_STREAM.to_string(),
            vec![
                LogChunk {
                    lines: lines(&[
                        "[Container] Waiting for agent ping",
                        "[Container] Phase is DOWNLOAD_SOURCE",
                        "[Container] Running command cargo build --release",
                    ]),
                    next_token: None,
                },
                LogChunk {
                    lines: lines(&[
                        "   Compiling demo v0.1.0",
                        "    Finished release [optimized] target(s)",
                        "[Container] Running command cargo test",
                        "test result: ok. 42 passed; 0 failed",
                    ]),
                    next_token: None,
                },
            ],
        ),
        (
            FAILED_LOG_STREAM.to_string(),
            vec![LogChunk {
                lines: lines(&[
                    "[Container] Running command ./run-integration.sh",
                    "connecting to staging... timeout after 30s",
                    "[Container] Command did not exit successfully ./run-integration.sh exit status 1",
                    "[Container] Phase complete: BUILD State: FAILED",
                ]),
                next_token: None,
            }],
        ),
    ]
}

pub fn recording() -> Recording {
    Recording {
        pipelines: pipelines().into_iter().collect(),
        builds: builds().into_iter().map(|b| (b.id.clone(), b)).collect(),
        logs: logs().into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_codebuild_action_with_id_has_a_build_or_is_known() {
        let recording = recording();
        let demo = recording.pipelines[DEMO_PIPELINE].detail.as_ref().unwrap();
        let ids: Vec<_> = demo
            .stages
            .iter()
            .flat_map(|s| &s.actions)
            .filter(|a| a.provider == "CodeBuild")
            .filter_map(|a| a.external_execution_id.as_deref())
            .collect();
        assert_eq!(ids, vec![DEMO_BUILD]);
        assert!(recording.builds.contains_key(DEMO_BUILD));
        assert!(recording.builds.contains_key(FAILED_BUILD));
    }

    #[test]
    fn test_demo_build_has_inline_buildspec() {
        let recording = recording();
        assert!(recording.builds[DEMO_BUILD].project.has_inline_buildspec());
        assert!(!recording.builds[FAILED_BUILD].project.has_inline_buildspec());
        assert!(recording.logs[LOG_STREAM].len() >= 2);
    }
}
