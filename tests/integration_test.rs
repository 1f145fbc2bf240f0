use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const CATALOG: &str = r#"{
    "installed": {
        "identifier": "installed",
        "name": "Installed",
        "packages": [
            {
                "id": "ARP\\Machine\\X64\\{C0N70S0}",
                "name": "Contoso Tool",
                "versions": [
                    {
                        "version": "1.0.5.0",
                        "publishers": ["Contoso Ltd"],
                        "productCodes": ["{C0N70S0}"],
                        "metadata": { "InstalledType": "msi" }
                    }
                ]
            },
            {
                "id": "ARP\\Machine\\X64\\LocalThing",
                "name": "Local Thing",
                "versions": [ { "version": "3.1" } ]
            }
        ]
    },
    "available": [
        {
            "identifier": "community",
            "name": "Community",
            "packages": [
                {
                    "id": "Contoso.Tool",
                    "name": "Contoso Tool",
                    "versions": [
                        { "version": "2.0", "productCodes": ["{c0n70s0}"], "arpMinVersion": "2.0.0.0", "arpMaxVersion": "2.0.9.9" },
                        { "version": "1.0", "productCodes": ["{c0n70s0}"], "arpMinVersion": "1.0.0.0", "arpMaxVersion": "1.0.9.9" }
                    ]
                },
                {
                    "id": "Fabrikam.Editor",
                    "name": "Fabrikam Editor",
                    "versions": [ { "version": "5.0", "publishers": ["Fabrikam"] } ]
                }
            ]
        },
        {
            "identifier": "offline",
            "name": "Offline Mirror",
            "fail": "mirror unreachable"
        }
    ]
}"#;

fn write_catalog(content: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

fn pkgcorr(catalog: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("pkgcorr"));
    cmd.env_remove("PKGCORR_CATALOG").arg("--catalog").arg(catalog);
    cmd
}

#[test]
fn test_search_everything_correlates_and_reports_failures() {
    let (_dir, catalog) = write_catalog(CATALOG);

    pkgcorr(&catalog)
        .arg("search")
        .assert()
        .success()
        .stdout(predicate::str::contains("Contoso.Tool"))
        .stdout(predicate::str::contains("Fabrikam.Editor"))
        .stdout(predicate::str::contains("Local Thing"))
        .stdout(predicate::str::contains("1.0.5.0").not())
        .stderr(predicate::str::contains("Offline Mirror"))
        .stderr(predicate::str::contains("mirror unreachable"));
}

#[test]
fn test_search_query_narrows_results() {
    let (_dir, catalog) = write_catalog(CATALOG);

    pkgcorr(&catalog)
        .args(["search", "fabrikam"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fabrikam.Editor"))
        .stdout(predicate::str::contains("Contoso.Tool").not());
}

#[test]
fn test_search_installed_behavior_drops_available_only() {
    let (_dir, catalog) = write_catalog(CATALOG);

    pkgcorr(&catalog)
        .args(["search", "--behavior", "installed", "o"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Contoso.Tool"))
        .stdout(predicate::str::contains("Fabrikam.Editor").not());
}

#[test]
fn test_search_max_results_truncates() {
    let (_dir, catalog) = write_catalog(CATALOG);

    pkgcorr(&catalog)
        .args(["search", "--max-results", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("truncated"));
}

#[test]
fn test_list_marks_updates() {
    let (_dir, catalog) = write_catalog(&CATALOG.replace(
        r#""name": "Community","#,
        r#""name": "Community", "features": ["installed-correlation-search"],"#,
    ));

    pkgcorr(&catalog)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("2.0 (update)"))
        .stdout(predicate::str::contains("Local Thing"))
        .stdout(predicate::str::contains("Fabrikam.Editor").not());
}

#[test]
fn test_empty_result() {
    let (_dir, catalog) = write_catalog(r#"{ "available": [ { "identifier": "empty" } ] }"#);

    pkgcorr(&catalog)
        .arg("search")
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages found."));
}

#[test]
fn test_missing_catalog_fails() {
    let dir = tempdir().unwrap();

    pkgcorr(&dir.path().join("missing.json"))
        .arg("search")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Catalog file not found"));
}

#[test]
fn test_invalid_catalog_fails() {
    let (_dir, catalog) = write_catalog("{ not json");

    pkgcorr(&catalog)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse catalog"));
}

#[test]
fn test_version_flag() {
    Command::new(cargo::cargo_bin!("pkgcorr"))
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("pkgcorr "));
}
