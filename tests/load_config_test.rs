use std::fs;

use tempfile::tempdir;

use repofuse::load_config::load_config;

#[test]
fn loads_minimal_config_and_applies_defaults() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("repofuse.yaml");
    fs::write(
        &path,
        "root_dir: /project\noutput_dir: /out\nproject_name: demo\nextension_groups:\n  code:\n    - js\n    - ts\ninclude_groups:\n  - code\n",
    )
    .unwrap();

    let config = load_config(&path).expect("config should load");
    assert_eq!(config.project_name, "demo");
    assert_eq!(config.selected_extensions(), vec![".js", ".ts"]);
    assert!(config.recurse, "recurse defaults to true");
    assert!(config.use_gitignore, "gitignore defaults to on");
    assert_eq!(config.output_file, "fusion.txt");
    assert_eq!(config.log_file, "fusion.log");
}

#[test]
fn rejects_missing_project_name() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("repofuse.yaml");
    fs::write(&path, "root_dir: /project\noutput_dir: /out\nproject_name: \"\"\n").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("project_name"));
}

#[test]
fn rejects_unknown_selected_group() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("repofuse.yaml");
    fs::write(
        &path,
        "root_dir: /project\noutput_dir: /out\nproject_name: demo\nextension_groups:\n  code:\n    - js\ninclude_groups:\n  - docs\n",
    )
    .unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(err.to_string().contains("docs"));
}

#[test]
fn rejects_unreadable_config_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
