//! Deterministic project rules
//!
//! Four checks over the corpus, no model involvement. The report is always
//! computable, including on an empty corpus.

use serde::Serialize;
use tracing::debug;

use super::{Corpus, Record, Status};
use crate::config::RulesConfig;

/// The rule a violation breaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rule {
    /// Shared work must not name a specific application
    SharedScopeNamesApp,
    /// Independent applications must not gate each other
    CrossAppGating,
    /// New scenes must derive from a declared template
    SceneTemplate,
    /// The test count must not fall below the floor
    TestFloor,
}

impl Rule {
    pub fn number(&self) -> u8 {
        match self {
            Self::SharedScopeNamesApp => 1,
            Self::CrossAppGating => 2,
            Self::SceneTemplate => 3,
            Self::TestFloor => 4,
        }
    }
}

/// One broken rule, with the record that breaks it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: Rule,
    pub record_id: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RULE {} VIOLATION: {}", self.rule.number(), self.message)
    }
}

/// Result of running all rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub count: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.count == 0
    }

    /// Violations rendered as flag strings
    pub fn flags(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Run the four rules against the corpus
pub fn validate(corpus: &Corpus, rules: &RulesConfig) -> ValidationReport {
    debug!(tasks = corpus.tasks.len(), apps = rules.apps.len(), "validate: called");
    let mut violations = Vec::new();

    check_shared_scope(corpus, rules, &mut violations);
    check_cross_app_gating(corpus, rules, &mut violations);
    check_scene_templates(corpus, rules, &mut violations);
    check_test_floor(corpus, rules, &mut violations);

    debug!(count = violations.len(), "validate: done");
    ValidationReport {
        count: violations.len(),
        violations,
    }
}

fn is_shared(record: &Record, rules: &RulesConfig) -> bool {
    record
        .scope
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case(&rules.shared_scope))
}

/// Application scope of a record, if it is scoped to one of the configured apps
fn app_scope<'a>(record: &Record, rules: &'a RulesConfig) -> Option<&'a str> {
    let scope = record.scope.as_deref()?;
    rules
        .apps
        .iter()
        .find(|app| app.eq_ignore_ascii_case(scope))
        .map(String::as_str)
}

fn check_shared_scope(corpus: &Corpus, rules: &RulesConfig, violations: &mut Vec<Violation>) {
    for task in corpus.tasks.iter().filter(|t| is_shared(t, rules)) {
        let text = format!("{} {}", task.title, task.description).to_lowercase();
        for app in &rules.apps {
            if !app.is_empty() && text.contains(&app.to_lowercase()) {
                violations.push(Violation {
                    rule: Rule::SharedScopeNamesApp,
                    record_id: Some(task.id.clone()),
                    message: format!("task {} is scoped '{}' but names application '{}'", task.id, rules.shared_scope, app),
                });
            }
        }
    }
}

fn check_cross_app_gating(corpus: &Corpus, rules: &RulesConfig, violations: &mut Vec<Violation>) {
    let records = corpus
        .goals
        .iter()
        .chain(&corpus.milestones)
        .chain(&corpus.tasks)
        .chain(&corpus.sessions);

    for record in records {
        let Some(own_app) = app_scope(record, rules) else {
            continue;
        };
        for dep_id in &record.depends_on {
            let Some(dep) = corpus.find(dep_id) else {
                continue;
            };
            if let Some(dep_app) = app_scope(dep, rules)
                && dep_app != own_app
            {
                violations.push(Violation {
                    rule: Rule::CrossAppGating,
                    record_id: Some(record.id.clone()),
                    message: format!(
                        "{} ({}) depends on {} ({}); applications must not gate each other",
                        record.id, own_app, dep.id, dep_app
                    ),
                });
            }
        }
    }
}

fn check_scene_templates(corpus: &Corpus, rules: &RulesConfig, violations: &mut Vec<Violation>) {
    let scenes = corpus.tasks.iter().filter(|t| {
        t.status != Status::Done
            && t.kind
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case(&rules.scene_kind))
    });

    for scene in scenes {
        match scene.template.as_deref() {
            Some(template) if rules.scene_templates.iter().any(|t| t == template) => {}
            Some(template) => violations.push(Violation {
                rule: Rule::SceneTemplate,
                record_id: Some(scene.id.clone()),
                message: format!("scene task {} uses undeclared template '{}'", scene.id, template),
            }),
            None => violations.push(Violation {
                rule: Rule::SceneTemplate,
                record_id: Some(scene.id.clone()),
                message: format!("scene task {} names no template", scene.id),
            }),
        }
    }
}

fn check_test_floor(corpus: &Corpus, rules: &RulesConfig, violations: &mut Vec<Violation>) {
    if let Some(latest) = corpus.latest_test_floor()
        && latest < rules.test_floor
    {
        violations.push(Violation {
            rule: Rule::TestFloor,
            record_id: corpus.latest_journal().map(|e| e.id.clone()),
            message: format!("latest test count {} is below the floor of {}", latest, rules.test_floor),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::JournalEntry;
    use std::collections::BTreeMap;

    fn rules() -> RulesConfig {
        RulesConfig {
            test_floor: 400,
            apps: vec!["dungeon".to_string(), "racing".to_string()],
            scene_templates: vec!["BaseScene".to_string()],
            ..RulesConfig::default()
        }
    }

    fn journal(id: &str, floor: Option<u32>) -> JournalEntry {
        JournalEntry {
            id: id.to_string(),
            date: None,
            test_floor: floor,
            summary: String::new(),
            committed: vec![],
            tasks_completed: vec![],
            tasks_added: vec![],
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_empty_corpus_is_clean() {
        let report = validate(&Corpus::default(), &rules());
        assert!(report.is_clean());
        assert_eq!(report.count, 0);
    }

    #[test]
    fn test_shared_task_naming_app() {
        let mut corpus = Corpus::default();
        let mut task = Record::new("T001", "Add Dungeon loot hook", Status::Active).with_scope("shared");
        task.description = "generic".to_string();
        corpus.tasks.push(task);
        corpus
            .tasks
            .push(Record::new("T002", "Generic physics", Status::Active).with_scope("shared"));

        let report = validate(&corpus, &rules());
        assert_eq!(report.count, 1);
        assert_eq!(report.violations[0].rule, Rule::SharedScopeNamesApp);
        assert_eq!(report.violations[0].record_id.as_deref(), Some("T001"));
        assert!(report.flags()[0].starts_with("RULE 1 VIOLATION"));
    }

    #[test]
    fn test_cross_app_dependency() {
        let mut corpus = Corpus::default();
        let mut gated = Record::new("T010", "Racing unlock", Status::Queued).with_scope("racing");
        gated.depends_on = vec!["T011".to_string(), "T012".to_string(), "missing".to_string()];
        corpus.tasks.push(gated);
        corpus
            .tasks
            .push(Record::new("T011", "Dungeon boss", Status::Queued).with_scope("dungeon"));
        corpus
            .tasks
            .push(Record::new("T012", "Shared input", Status::Queued).with_scope("shared"));

        let report = validate(&corpus, &rules());
        assert_eq!(report.count, 1);
        assert_eq!(report.violations[0].rule, Rule::CrossAppGating);
    }

    #[test]
    fn test_scene_template_rule() {
        let mut corpus = Corpus::default();
        let mut good = Record::new("T020", "Good scene", Status::Active);
        good.kind = Some("scene".to_string());
        good.template = Some("BaseScene".to_string());
        let mut bad = Record::new("T021", "Bad scene", Status::Queued);
        bad.kind = Some("Scene".to_string());
        bad.template = Some("Custom".to_string());
        let mut missing = Record::new("T022", "No template", Status::Active);
        missing.kind = Some("scene".to_string());
        let mut done = Record::new("T023", "Old scene", Status::Done);
        done.kind = Some("scene".to_string());
        corpus.tasks.extend([good, bad, missing, done]);

        let report = validate(&corpus, &rules());
        let ids: Vec<_> = report.violations.iter().filter_map(|v| v.record_id.as_deref()).collect();
        assert_eq!(ids, vec!["T021", "T022"]);
    }

    #[test]
    fn test_test_floor_uses_latest_entry() {
        let mut corpus = Corpus::default();
        corpus.journal.push(journal("S001", Some(500)));
        corpus.journal.push(journal("S002", Some(390)));
        corpus.journal.push(journal("S003", None));

        let report = validate(&corpus, &rules());
        assert_eq!(report.count, 1);
        assert_eq!(report.violations[0].rule, Rule::TestFloor);
        assert!(report.violations[0].message.contains("390"));
    }

    #[test]
    fn test_test_floor_met() {
        let mut corpus = Corpus::default();
        corpus.journal.push(journal("S001", Some(400)));
        assert!(validate(&corpus, &rules()).is_clean());
    }
}
