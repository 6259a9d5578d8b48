use assert_cmd::{Command, cargo_bin_cmd};

fn almanac() -> Command {
    cargo_bin_cmd!("almanac")
}

mod help_and_version {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_help_flag() {
        almanac()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage:"))
            .stdout(predicate::str::contains("Commands:"))
            .stdout(predicate::str::contains("sync"))
            .stdout(predicate::str::contains("gc"));
    }

    #[test]
    fn test_version_flag() {
        almanac()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("almanac"));
    }

    #[test]
    fn test_no_args_shows_help() {
        almanac()
            .assert()
            .failure()
            .stderr(predicate::str::contains("Usage:"));
    }
}

mod argument_validation {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_sync_help_lists_the_filters() {
        almanac()
            .args(["sync", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--target"))
            .stdout(predicate::str::contains("--filter-inbox-task"))
            .stdout(predicate::str::contains("--drop-all-remote"))
            .stdout(predicate::str::contains("--even-if-unmodified"))
            .stdout(predicate::str::contains("--prefer"));
    }

    #[test]
    fn test_sync_rejects_an_unknown_target() {
        almanac()
            .args(["sync", "--target", "laundry"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--target"));
    }

    #[test]
    fn test_sync_rejects_an_unknown_prefer_side() {
        almanac()
            .args(["sync", "--prefer", "upstream"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--prefer"));
    }

    #[test]
    fn test_person_remove_requires_a_numeric_ref_id() {
        almanac()
            .args(["person", "remove", "grandma"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid entity ID"));
    }

    #[test]
    fn test_list_requires_a_smart_list() {
        almanac()
            .args(["list"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("SMART_LIST"));
    }

    #[test]
    fn test_list_done_flags_conflict() {
        almanac()
            .args(["list", "5", "--done", "--not-done"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }
}

mod completion {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_bash_completions_are_generated() {
        almanac()
            .args(["completion", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("almanac"));
    }
}

mod configuration {
    use super::*;
    use predicates::prelude::predicate;

    #[test]
    fn test_unconfigured_remote_fails_before_doing_anything() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("absent.toml");

        let mut cmd = almanac();
        for key in [
            "ALMANAC_CONFIG",
            "ALMANAC_REMOTE_BASE_URL",
            "ALMANAC_REMOTE_TOKEN",
            "ALMANAC_DATABASE_PATH",
            "ALMANAC_LOCK_PATH",
            "ALMANAC_SYNC_PREFER",
        ] {
            cmd.env_remove(key);
        }
        cmd.args(["gc", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid configuration"));
    }
}
