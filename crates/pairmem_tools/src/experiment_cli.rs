#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;

use pairmem_engines::participant::{issue_participant_id, ParticipantId};
use pairmem_engines::ScheduleConfig;
use pairmem_kernel_contracts::catalog::Catalog;
use pairmem_kernel_contracts::outcome::TrialOutcome;
use pairmem_kernel_contracts::schedule::ConditionLabel;
use pairmem_kernel_contracts::Validate;
use pairmem_os::export::{ExportInput, ExportWiringOutcome};
use pairmem_os::{build_schedule_with_candidates, ExportWiring, ExportWiringConfig, ScheduleResult};
use pairmem_storage::DirExportSink;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub const USAGE: &str = "usage:
  pairmem schedule <catalog.json> [--seed N] [--config config.json]
  pairmem aggregate <schedule.json> <outcomes.json> <participant_id> <stamp> <out_dir>
  pairmem participant-id <initials> [--seed N]";

pub fn execute_command(args: &[String]) -> Result<String, String> {
    let (command, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;
    let (positional, flags) = split_flags(rest)?;
    match command.as_str() {
        "schedule" => {
            let [catalog_path] = positional[..] else {
                return Err(USAGE.to_string());
            };
            let catalog: Catalog = read_json(catalog_path, "catalog")?;
            let config = match flags.get("config") {
                Some(path) => read_json::<ScheduleConfig>(path, "config")?,
                None => ScheduleConfig::mvp_v1(),
            };
            let seed = seed_flag(&flags)?;
            let schedule =
                build_schedule_with_candidates(&catalog, &config, &mut StdRng::seed_from_u64(seed))
                    .map_err(|e| format!("failed to build schedule: {e}"))?;
            tracing::info!(seed, fingerprint = %schedule.fingerprint, "schedule ready");
            serde_json::to_string_pretty(&schedule)
                .map_err(|e| format!("failed to encode schedule: {e}"))
        }
        "aggregate" => {
            let [schedule_path, outcomes_path, participant, stamp, out_dir] = positional[..]
            else {
                return Err(USAGE.to_string());
            };
            let schedule: ScheduleResult = read_json(schedule_path, "schedule")?;
            schedule
                .validate()
                .map_err(|e| format!("invalid schedule {schedule_path}: {e}"))?;
            let outcomes: Vec<TrialOutcome> = read_json(outcomes_path, "outcomes")?;
            let associations = schedule
                .association_map()
                .map_err(|e| format!("invalid schedule {schedule_path}: {e}"))?;
            let participant_id = ParticipantId::parse(participant)
                .map_err(|e| format!("invalid participant id '{participant}': {e}"))?;
            let input = ExportInput::v1(participant_id, stamp.to_string(), schedule.keys.clone())
                .map_err(|e| format!("invalid export input: {e}"))?;

            let sink = DirExportSink::open(out_dir)
                .map_err(|e| format!("failed to open output directory: {e}"))?;
            let mut wiring = ExportWiring::new(ExportWiringConfig::mvp_v1(true), sink)
                .map_err(|e| e.to_string())?;
            match wiring
                .run_export(&input, &outcomes, &associations)
                .map_err(|e| format!("export failed: {e}"))?
            {
                ExportWiringOutcome::NotInvokedDisabled => Ok("export disabled".to_string()),
                ExportWiringOutcome::Exported(receipt) => {
                    let summary = &receipt.report.summary;
                    let mut lines = vec![
                        format!("{} {}", receipt.learning.name, receipt.learning.sha256_hex),
                        format!("{} {}", receipt.test.name, receipt.test.sha256_hex),
                    ];
                    for c in ConditionLabel::all() {
                        lines.push(format!(
                            "image_accuracy_{c}={}",
                            summary.condition_accuracy(*c)
                        ));
                    }
                    lines.push(format!("sound_accuracy={}", summary.sound_accuracy()));
                    lines.push(format!("data_gaps={}", receipt.report.gaps.len()));
                    Ok(lines.join("\n"))
                }
            }
        }
        "participant-id" => {
            let [initials] = positional[..] else {
                return Err(USAGE.to_string());
            };
            let seed = seed_flag(&flags)?;
            let id = issue_participant_id(initials, &mut StdRng::seed_from_u64(seed))
                .map_err(|e| format!("invalid initials '{initials}': {e}"))?;
            Ok(id.to_string())
        }
        _ => Err(format!(
            "unknown command: {command}. expected one of: schedule, aggregate, participant-id"
        )),
    }
}

/// `--name value` pairs out, positionals in order.
fn split_flags(args: &[String]) -> Result<(Vec<&str>, BTreeMap<&str, &str>), String> {
    let mut positional = Vec::new();
    let mut flags = BTreeMap::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(name) = arg.strip_prefix("--") {
            if !matches!(name, "seed" | "config") {
                return Err(format!("unknown flag --{name}"));
            }
            let value = iter
                .next()
                .ok_or_else(|| format!("missing value for --{name}"))?;
            if flags.insert(name, value.as_str()).is_some() {
                return Err(format!("--{name} given twice"));
            }
        } else {
            positional.push(arg.as_str());
        }
    }
    Ok((positional, flags))
}

/// Explicit `--seed`, or a fresh one that is logged so the run can be repeated.
fn seed_flag(flags: &BTreeMap<&str, &str>) -> Result<u64, String> {
    match flags.get("seed") {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("--seed must be an unsigned integer, got '{raw}'")),
        None => {
            let seed = rand::random();
            tracing::info!(seed, "no --seed given, drew one");
            Ok(seed)
        }
    }
}

fn read_json<T>(path: &str, what: &str) -> Result<T, String>
where
    T: serde::de::DeserializeOwned,
{
    let raw = fs::read_to_string(path).map_err(|e| format!("failed to read {what} {path}: {e}"))?;
    serde_json::from_str(&raw).map_err(|e| format!("failed to parse {what} {path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn write(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path.display().to_string()
    }

    fn catalog_json() -> String {
        let images = |prefix: &str| {
            (0..10)
                .map(|i| format!("\"{prefix}_{i}.jpg\""))
                .collect::<Vec<_>>()
                .join(",")
        };
        let sounds = (0..12)
            .map(|i| format!("\"s{i}.wav\""))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"{{
                "schema_version": 1,
                "categories": [
                    {{"domain": "indoor", "subcategory": "hall", "images": [{}]}},
                    {{"domain": "outdoor", "subcategory": "field", "images": [{}]}}
                ],
                "sounds": [{sounds}]
            }}"#,
            images("hall"),
            images("field")
        )
    }

    const CONFIG: &str = r#"{"images_per_category": 6, "pair_groups": 1, "singleton_groups": 2, "new_image_count": 5}"#;

    #[test]
    fn at_cli_01_participant_id_is_seeded() {
        let a = execute_command(&args(&["participant-id", "yt", "--seed", "3"])).unwrap();
        let b = execute_command(&args(&["participant-id", "yt", "--seed", "3"])).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("YT"));
        assert!(ParticipantId::parse(&a).is_ok());
    }

    #[test]
    fn at_cli_02_bad_invocations_explain_themselves() {
        assert!(execute_command(&[]).unwrap_err().starts_with("usage:"));
        assert!(execute_command(&args(&["launch"]))
            .unwrap_err()
            .starts_with("unknown command"));
        assert_eq!(
            execute_command(&args(&["participant-id", "yt", "--seed"])).unwrap_err(),
            "missing value for --seed"
        );
        assert!(execute_command(&args(&["participant-id", "yt", "--seed", "x"]))
            .unwrap_err()
            .starts_with("--seed must be"));
        assert!(execute_command(&args(&["participant-id", "yt", "--fast", "1"]))
            .unwrap_err()
            .starts_with("unknown flag"));
    }

    #[test]
    fn at_cli_03_schedule_then_aggregate_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = write(dir.path(), "catalog.json", &catalog_json());
        let config = write(dir.path(), "config.json", CONFIG);

        let schedule_json = execute_command(&args(&[
            "schedule",
            catalog.as_str(),
            "--seed",
            "11",
            "--config",
            config.as_str(),
        ]))
        .unwrap();
        let schedule: ScheduleResult = serde_json::from_str(&schedule_json).unwrap();
        assert_eq!(schedule.learning_trials.len(), 12);
        let schedule_path = write(dir.path(), "schedule.json", &schedule_json);

        let first = &schedule.image_probes[0];
        let outcomes = format!(
            r#"[{{"metadata": {{"task_phase": "image_recognition", "image_id": "{}", "status": "old"}},
                 "response": "j", "correct": true, "rt_ms": 700}}]"#,
            first.image_id
        );
        let outcomes_path = write(dir.path(), "outcomes.json", &outcomes);
        let out_dir = dir.path().join("out").display().to_string();

        let report = execute_command(&args(&[
            "aggregate",
            schedule_path.as_str(),
            outcomes_path.as_str(),
            "YT042",
            "s1",
            out_dir.as_str(),
        ]))
        .unwrap();
        assert!(report.contains("learning_YT042_s1.csv"));
        assert!(report.contains("data_gaps=0"));
        let condition = schedule
            .association_map()
            .unwrap()
            .get(&first.image_id)
            .unwrap()
            .condition;
        assert!(report.contains(&format!("image_accuracy_{condition}=100.00")));
        assert!(Path::new(&out_dir).join("test_YT042_s1.csv").exists());
    }

    #[test]
    fn at_cli_04_tampered_schedule_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = write(dir.path(), "catalog.json", &catalog_json());
        let config = write(dir.path(), "config.json", CONFIG);
        let schedule_json = execute_command(&args(&[
            "schedule",
            catalog.as_str(),
            "--seed",
            "11",
            "--config",
            config.as_str(),
        ]))
        .unwrap();
        let mut schedule: ScheduleResult = serde_json::from_str(&schedule_json).unwrap();
        schedule.learning_trials.pop();
        let schedule_path = write(
            dir.path(),
            "schedule.json",
            &serde_json::to_string(&schedule).unwrap(),
        );
        let outcomes_path = write(dir.path(), "outcomes.json", "[]");
        let err = execute_command(&args(&[
            "aggregate",
            schedule_path.as_str(),
            outcomes_path.as_str(),
            "YT042",
            "s1",
            dir.path().join("out").display().to_string().as_str(),
        ]))
        .unwrap_err();
        assert!(err.starts_with("invalid schedule"));
    }
}
