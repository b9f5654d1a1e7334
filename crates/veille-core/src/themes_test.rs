use std::io::Write as _;
use std::time::Duration;

use super::*;

fn theme_cfg(name: &str, keywords: &[&str], priority: Priority) -> ThemeConfig {
    ThemeConfig {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        max_items_per_keyword: 10,
        priority,
        refresh_cadence: "daily".to_string(),
        assigned_member: None,
    }
}

fn file_with(themes: Vec<ThemeConfig>) -> ThemesFile {
    ThemesFile {
        global_keywords: vec!["Niger".to_string()],
        themes,
    }
}

const SAMPLE_YAML: &str = r#"
global_keywords: ["Niger", "Niamey"]
themes:
  - name: Agriculture
    keywords: ["mil Niger", "récolte Niger"]
    max_items_per_keyword: 15
    priority: high
    refresh_cadence: daily
    assigned_member: alice
  - name: Santé
    keywords: ["santé Niger", "paludisme"]
    max_items_per_keyword: 10
    priority: critical
    refresh_cadence: 6h
"#;

#[test]
fn parse_cadence_named_and_suffixed() {
    assert_eq!(parse_cadence("hourly"), Ok(Duration::from_secs(3600)));
    assert_eq!(parse_cadence("Daily"), Ok(Duration::from_secs(86_400)));
    assert_eq!(parse_cadence("weekly"), Ok(Duration::from_secs(604_800)));
    assert_eq!(parse_cadence("30m"), Ok(Duration::from_secs(1800)));
    assert_eq!(parse_cadence("6h"), Ok(Duration::from_secs(21_600)));
    assert_eq!(parse_cadence("2d"), Ok(Duration::from_secs(172_800)));
}

#[test]
fn parse_cadence_rejects_garbage_and_zero() {
    assert!(parse_cadence("").is_err());
    assert!(parse_cadence("0h").is_err());
    assert!(parse_cadence("fortnightly").is_err());
    assert!(parse_cadence("5s").is_err());
    assert!(parse_cadence("1é").is_err());
}

#[test]
fn yaml_sample_loads() {
    let file: ThemesFile = serde_yaml::from_str(SAMPLE_YAML).unwrap();
    let set = ThemeSet::from_file(file).unwrap();
    assert_eq!(set.names(), vec!["Agriculture", "Santé"]);
    assert_eq!(set.global_keywords, vec!["Niger", "Niamey"]);

    let agri = set.get("Agriculture").unwrap();
    assert_eq!(agri.max_items_per_keyword, 15);
    assert_eq!(agri.assigned_member.as_deref(), Some("alice"));
    assert_eq!(agri.refresh_cadence, Duration::from_secs(86_400));
}

#[test]
fn validate_rejects_duplicate_names_case_insensitively() {
    let file = file_with(vec![
        theme_cfg("Santé", &["a"], Priority::High),
        theme_cfg("santé", &["b"], Priority::High),
    ]);
    let err = ThemeSet::from_file(file).unwrap_err();
    assert!(err.to_string().contains("duplicate theme name"));
}

#[test]
fn validate_rejects_empty_keywords() {
    let file = file_with(vec![theme_cfg("Sport", &[], Priority::Medium)]);
    let err = ThemeSet::from_file(file).unwrap_err();
    assert!(err.to_string().contains("no keywords"));

    let file = file_with(vec![theme_cfg("Sport", &["football", "  "], Priority::Medium)]);
    let err = ThemeSet::from_file(file).unwrap_err();
    assert!(err.to_string().contains("blank keyword"));
}

#[test]
fn validate_rejects_out_of_range_cap() {
    let mut cfg = theme_cfg("Sport", &["football"], Priority::Medium);
    cfg.max_items_per_keyword = 0;
    let err = ThemeSet::from_file(file_with(vec![cfg])).unwrap_err();
    assert!(err.to_string().contains("max_items_per_keyword 0"));

    let mut cfg = theme_cfg("Sport", &["football"], Priority::Medium);
    cfg.max_items_per_keyword = 101;
    assert!(ThemeSet::from_file(file_with(vec![cfg])).is_err());
}

#[test]
fn validate_rejects_empty_name() {
    let file = file_with(vec![theme_cfg("   ", &["x"], Priority::High)]);
    assert!(ThemeSet::from_file(file).is_err());
}

#[test]
fn find_is_case_insensitive() {
    let set = ThemeSet::from_file(file_with(vec![theme_cfg(
        "Économie",
        &["économie Niger"],
        Priority::High,
    )]))
    .unwrap();
    assert!(set.find("économie").is_some());
    assert!(set.get("économie").is_none());
}

#[test]
fn by_priority_keeps_registry_order_within_priority() {
    let set = ThemeSet::from_file(file_with(vec![
        theme_cfg("Sport", &["a"], Priority::Medium),
        theme_cfg("Sécurité", &["b"], Priority::Critical),
        theme_cfg("Politique", &["c"], Priority::High),
        theme_cfg("Santé", &["d"], Priority::Critical),
    ]))
    .unwrap();
    let names: Vec<&str> = set.by_priority().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Sécurité", "Santé", "Politique", "Sport"]);
}

#[test]
fn infer_theme_counts_hits_then_priority() {
    let set = ThemeSet::from_file(file_with(vec![
        theme_cfg("Agriculture", &["mil", "récolte"], Priority::High),
        theme_cfg("Sécurité", &["attaque", "armée"], Priority::Critical),
        theme_cfg("Économie", &["récolte"], Priority::Critical),
    ]))
    .unwrap();

    let theme = set.infer_theme("La récolte de MIL progresse").unwrap();
    assert_eq!(theme.name, "Agriculture");

    // One hit each for Agriculture and Économie; Économie wins on priority.
    let theme = set.infer_theme("une récolte record").unwrap();
    assert_eq!(theme.name, "Économie");

    assert!(set.infer_theme("rien à voir").is_none());
}

#[test]
fn registry_reload_swaps_snapshot_and_remembers_old_names() {
    let dir = std::env::temp_dir().join(format!("veille-themes-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("themes.yaml");
    std::fs::write(&path, SAMPLE_YAML).unwrap();

    let registry = ThemeRegistry::load(&path).unwrap();
    let before = registry.snapshot();
    assert!(registry.is_known("Agriculture"));

    let replacement = r#"
themes:
  - name: Culture
    keywords: ["festival Niamey"]
    max_items_per_keyword: 5
    priority: medium
    refresh_cadence: weekly
"#;
    std::fs::write(&path, replacement).unwrap();
    let after = registry.reload().unwrap();

    assert_eq!(after.names(), vec!["Culture"]);
    assert_eq!(registry.snapshot().names(), vec!["Culture"]);
    // A snapshot handed out earlier is untouched.
    assert_eq!(before.names(), vec!["Agriculture", "Santé"]);
    assert!(registry.is_known("Agriculture"));
    assert!(registry.is_known("Culture"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn failed_reload_keeps_previous_snapshot() {
    let dir = std::env::temp_dir().join(format!("veille-themes-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("themes.yaml");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(SAMPLE_YAML.as_bytes()).unwrap();
    drop(f);

    let registry = ThemeRegistry::load(&path).unwrap();
    std::fs::write(&path, "themes: [ { name: ").unwrap();

    assert!(registry.reload().is_err());
    assert_eq!(registry.snapshot().names(), vec!["Agriculture", "Santé"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_themes(Path::new("/definitely/not/here/themes.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::ThemesFileIo { .. }));
}

#[test]
fn run_scope_display_and_kind() {
    assert_eq!(RunScope::Global.to_string(), "global");
    assert_eq!(RunScope::AllThemes.kind(), "all_themes");
    let scope = RunScope::Theme("Santé".to_string());
    assert_eq!(scope.to_string(), "theme:Santé");
    assert_eq!(scope.theme(), Some("Santé"));
}
