//! Chart rendering with minijinja
//!
//! Files are read from `<charts_dir>/<chart.dir>/`. `Chart.yaml` is exposed
//! to templates as `Chart`, `values.yaml` supplies the lowest-precedence
//! defaults and everything else is a template. Templates whose file name
//! starts with `_` are partials: they can be imported by other templates but
//! are never emitted themselves.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use minijinja::{AutoEscape, Environment, UndefinedBehavior, context};
use serde::Deserialize;
use serde_yaml::Value;
use tracing::debug;

use super::{CHART_FILE, Chart, TemplateEngine, VALUES_FILE};
use crate::error::Result;
use crate::error::render::render_failed;
use crate::tree;

/// Renders charts stored under a charts root directory
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    charts_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(charts_dir: impl Into<PathBuf>) -> Self {
        Self {
            charts_dir: charts_dir.into(),
        }
    }
}

impl TemplateEngine for ChartRenderer {
    fn render(&self, chart: &Chart) -> Result<Vec<u8>> {
        let dir = self.charts_dir.join(&chart.dir);
        let fail = |reason: String| render_failed(&chart.name, reason);

        let mut metadata = Value::Null;
        let mut defaults = Value::Mapping(Default::default());
        let mut templates: Vec<(String, String)> = Vec::new();

        for file in &chart.files {
            let path = dir.join(file);
            let source = fs::read_to_string(&path)
                .map_err(|e| fail(format!("cannot read {}: {}", path.display(), e)))?;

            match file.as_str() {
                CHART_FILE => {
                    metadata = serde_yaml::from_str(&source)
                        .map_err(|e| fail(format!("invalid {}: {}", CHART_FILE, e)))?;
                }
                VALUES_FILE => {
                    defaults = serde_yaml::from_str(&source)
                        .map_err(|e| fail(format!("invalid {}: {}", VALUES_FILE, e)))?;
                }
                _ => templates.push((file.clone(), source)),
            }
        }

        let values = merge_raw_values(defaults, &chart.raw_values).map_err(fail)?;

        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("b64enc", b64enc);
        env.add_filter("quote", quote);

        for (name, source) in &templates {
            env.add_template(name, source)
                .map_err(|e| fail(format!("{}: {}", name, e)))?;
        }

        let ctx = context! {
            Values => minijinja::Value::from_serialize(&values),
            Release => context! {
                Namespace => &chart.namespace,
                Name => &chart.name,
            },
            Chart => minijinja::Value::from_serialize(&metadata),
        };

        let mut out = String::new();
        for (name, _) in &templates {
            if is_partial(name) {
                continue;
            }

            let rendered = env
                .get_template(name)
                .and_then(|template| template.render(&ctx))
                .map_err(|e| fail(format!("{}: {}", name, e)))?;

            let body = rendered.trim_start_matches('\n');
            if body.trim().is_empty() {
                debug!(chart = %chart.name, template = %name, "template rendered empty");
                continue;
            }

            out.push_str(&format!("---\n# Source: {}/{}\n", chart.name, name));
            out.push_str(body);
            if !body.ends_with('\n') {
                out.push('\n');
            }
        }

        Ok(out.into_bytes())
    }
}

/// Layer the raw value documents over the chart defaults
///
/// Earlier documents win over later ones.
fn merge_raw_values(defaults: Value, raw: &[u8]) -> std::result::Result<Value, String> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_slice(raw) {
        let value = Value::deserialize(document).map_err(|e| format!("invalid values: {}", e))?;
        if !value.is_null() {
            documents.push(value);
        }
    }

    let mut merged = defaults;
    for document in documents.into_iter().rev() {
        tree::merge(&mut merged, document);
    }
    Ok(merged)
}

fn is_partial(file: &str) -> bool {
    Path::new(file)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('_'))
}

fn b64enc(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Double-quoted scalar, escaped as JSON so the result is valid YAML
fn quote(value: minijinja::Value) -> std::result::Result<String, minijinja::Error> {
    let text = if value.is_undefined() || value.is_none() {
        String::new()
    } else {
        value.to_string()
    };
    serde_json::to_string(&text)
        .map_err(|e| minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallError;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, content: &str) {
        let path = dir.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sample_chart() -> TempDir {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("sample");
        write(&dir, "Chart.yaml", "name: sample\nversion: 1.2.3\n");
        write(&dir, "values.yaml", "image: base\nreplicas: 1\n");
        write(&dir, "templates/_helpers.tpl", "{% macro label(name) %}app: {{ name }}{% endmacro %}\n");
        write(
            &dir,
            "templates/deploy.yaml",
            "{% import \"templates/_helpers.tpl\" as helpers %}\nkind: Deployment\nmetadata:\n  namespace: {{ Release.Namespace }}\n  labels:\n    {{ helpers.label(Chart.name) }}\nspec:\n  image: {{ Values.image }}\n  replicas: {{ Values.replicas }}\n",
        );
        write(&dir, "templates/empty.yaml", "{% if Values.missing.flag %}kind: Never{% endif %}\n");
        write(&dir, "templates/secret.yaml", "data:\n  key: {{ Values.image | b64enc }}\n  name: {{ Values.image | quote }}\n");
        root
    }

    fn chart(files: &[&str], raw_values: &str) -> Chart {
        Chart {
            name: "sample".to_string(),
            dir: "sample".to_string(),
            namespace: "linkerd".to_string(),
            raw_values: raw_values.as_bytes().to_vec(),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    fn render(root: &TempDir, chart: &Chart) -> Result<String> {
        let bytes = ChartRenderer::new(root.path()).render(chart)?;
        Ok(String::from_utf8(bytes).unwrap())
    }

    #[test]
    fn test_renders_with_source_headers() {
        let root = sample_chart();
        let output = render(
            &root,
            &chart(
                &["Chart.yaml", "values.yaml", "templates/_helpers.tpl", "templates/deploy.yaml"],
                "",
            ),
        )
        .unwrap();

        assert!(output.starts_with("---\n# Source: sample/templates/deploy.yaml\nkind: Deployment\n"));
        assert!(output.contains("namespace: linkerd"));
        assert!(output.contains("app: sample"));
        assert!(output.contains("image: base"));
        assert!(!output.contains("_helpers.tpl"));
    }

    #[test]
    fn test_earlier_documents_win() {
        let root = sample_chart();
        let output = render(
            &root,
            &chart(
                &["Chart.yaml", "values.yaml", "templates/_helpers.tpl", "templates/deploy.yaml"],
                "image: addon\n---\nimage: base-override\nreplicas: 3\n",
            ),
        )
        .unwrap();

        assert!(output.contains("image: addon"));
        assert!(output.contains("replicas: 3"));
    }

    #[test]
    fn test_empty_templates_are_skipped() {
        let root = sample_chart();
        let output = render(&root, &chart(&["Chart.yaml", "templates/empty.yaml"], "")).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_filters() {
        let root = sample_chart();
        let output = render(&root, &chart(&["templates/secret.yaml"], "image: abc\n")).unwrap();
        assert!(output.contains("key: YWJj"));
        assert!(output.contains("name: \"abc\""));
    }

    #[test]
    fn test_quote_escapes_as_yaml_scalar() {
        let quoted = quote(minijinja::Value::from("say \"hi\"\u{1b}\\")).unwrap();
        assert_eq!(quoted, "\"say \\\"hi\\\"\\u001b\\\\\"");
        let parsed: String = serde_yaml::from_str(&quoted).unwrap();
        assert_eq!(parsed, "say \"hi\"\u{1b}\\");

        assert_eq!(quote(minijinja::Value::UNDEFINED).unwrap(), "\"\"");
    }

    #[test]
    fn test_missing_file_is_render_error() {
        let root = sample_chart();
        let err = render(&root, &chart(&["templates/nope.yaml"], "")).unwrap_err();
        assert!(matches!(err, InstallError::Render { ref chart, .. } if chart == "sample"));
    }

    #[test]
    fn test_template_syntax_error_is_render_error() {
        let root = sample_chart();
        write(&root.path().join("sample"), "templates/bad.yaml", "{% if %}\n");
        let err = render(&root, &chart(&["templates/bad.yaml"], "")).unwrap_err();
        assert!(err.to_string().contains("templates/bad.yaml"));
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial("templates/_helpers.tpl"));
        assert!(!is_partial("templates/web.yaml"));
    }
}
