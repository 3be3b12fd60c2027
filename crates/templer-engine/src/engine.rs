//! Template engine based on MiniJinja

use minijinja::{Environment, UndefinedBehavior, Value as JinjaValue};
use templer_core::Mapping;

use crate::error::TemplateError;
use crate::filters;
use crate::omit::OmitSentinel;

/// Name and major version of the template language, shown by `--version`
pub const TEMPLATE_LANGUAGE: &str = "minijinja 2";

/// Template engine builder
pub struct EngineBuilder {
    omit: Option<OmitSentinel>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self { omit: None }
    }

    /// Use a fixed omit sentinel instead of generating one
    pub fn omit(mut self, omit: OmitSentinel) -> Self {
        self.omit = Some(omit);
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        Engine::new(self.omit.unwrap_or_default())
    }
}

/// The template engine
///
/// One environment is built up front and shared by every render. The `omit`
/// global is part of the environment, so it never appears in a context.
pub struct Engine {
    env: Environment<'static>,
    omit: OmitSentinel,
}

impl Default for Engine {
    fn default() -> Self {
        EngineBuilder::new().build()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("omit", &self.omit).finish_non_exhaustive()
    }
}

impl Engine {
    fn new(omit: OmitSentinel) -> Self {
        Self {
            env: create_environment(&omit),
            omit,
        }
    }

    /// Create a builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The sentinel the `omit` global renders to
    pub fn omit(&self) -> &OmitSentinel {
        &self.omit
    }

    /// Render a single template string
    ///
    /// `name` labels the template in error messages, usually its path.
    pub fn render_str(
        &self,
        template: &str,
        context: &Mapping,
        name: &str,
    ) -> Result<String, TemplateError> {
        self.env
            .render_named_str(name, template, context)
            .map_err(|e| TemplateError::from_minijinja(e, name, template, Some(context)))
    }
}

/// Create a configured MiniJinja environment
///
/// Undefined variables are always an error.
fn create_environment(omit: &OmitSentinel) -> Environment<'static> {
    let mut env = Environment::new();

    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);

    env.add_global("omit", JinjaValue::from(omit.as_str()));

    // Register custom filters
    env.add_filter("mandatory", filters::mandatory);
    env.add_filter("to_yaml", filters::to_yaml);
    env.add_filter("to_nice_yaml", filters::to_nice_yaml);
    env.add_filter("to_json", filters::to_json);
    env.add_filter("to_nice_json", filters::to_nice_json);
    env.add_filter("to_bool", filters::to_bool);
    env.add_filter("regex_escape", filters::regex_escape);
    env.add_filter("regex_findall", filters::regex_findall);
    env.add_filter("regex_replace", filters::regex_replace);
    env.add_filter("regex_search", filters::regex_search);
    env.add_filter("regex_contains", filters::regex_contains);

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TemplateErrorKind;
    use templer_core::mapping_from_yaml;

    fn ctx(yaml: &str) -> Mapping {
        mapping_from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_render_simple() {
        let engine = Engine::default();
        let out = engine
            .render_str("service: {{ name }}", &ctx("name: web"), "test")
            .unwrap();
        assert_eq!(out, "service: web");
    }

    #[test]
    fn test_render_nested_and_lists() {
        let engine = Engine::default();
        let out = engine
            .render_str(
                "{% for p in app.ports %}\n- {{ p }}\n{% endfor %}\n",
                &ctx("app: {ports: [80, 443]}"),
                "test",
            )
            .unwrap();
        assert_eq!(out, "- 80\n- 443\n");
    }

    #[test]
    fn test_undefined_variable_is_error() {
        let engine = Engine::default();
        let err = engine
            .render_str("image: {{ registy }}/web", &ctx("registry: docker.io"), "web.yml")
            .unwrap_err();
        assert_eq!(err.kind(), TemplateErrorKind::UndefinedVariable);
        assert_eq!(err.suggestion.as_deref(), Some("Did you mean `registry`?"));
    }

    #[test]
    fn test_syntax_error() {
        let engine = Engine::default();
        let err = engine
            .render_str("{{ name ", &ctx("name: web"), "test")
            .unwrap_err();
        assert_eq!(err.kind(), TemplateErrorKind::SyntaxError);
        assert!(err.message.starts_with("Template error: "));
    }

    #[test]
    fn test_mandatory_error() {
        let engine = Engine::default();
        let template = "{{ password | mandatory('password must be set') }}";
        let err = engine
            .render_str(template, &ctx("password: ''"), "test")
            .unwrap_err();
        assert_eq!(err.kind(), TemplateErrorKind::MandatoryValue);
        assert_eq!(err.message, "password must be set");
    }

    #[test]
    fn test_unknown_filter() {
        let engine = Engine::default();
        let err = engine
            .render_str("{{ name | to_yml }}", &ctx("name: web"), "test")
            .unwrap_err();
        assert_eq!(err.kind(), TemplateErrorKind::UnknownFilter);
    }

    #[test]
    fn test_omit_global() {
        let engine = Engine::default();
        let out = engine.render_str("{{ omit }}", &Mapping::new(), "test").unwrap();
        assert_eq!(out, engine.omit().as_str());
    }

    #[test]
    fn test_fixed_omit() {
        let omit = OmitSentinel::new();
        let engine = Engine::builder().omit(omit.clone()).build();
        assert_eq!(engine.omit(), &omit);
    }

    #[test]
    fn test_context_key_order_preserved() {
        let engine = Engine::default();
        let out = engine
            .render_str("{{ labels | to_json }}", &ctx("labels: {z: 1, a: 2}"), "test")
            .unwrap();
        assert_eq!(out, r#"{"z": 1, "a": 2}"#);
    }

    #[test]
    fn test_render_compose_snippet() {
        let engine = Engine::default();
        let template = concat!(
            "services:\n",
            "{% for name, svc in services | items %}\n",
            "  {{ name }}:\n",
            "    image: {{ svc.image }}\n",
            "    restart: {{ svc.restart }}\n",
            "{% endfor %}\n",
        );
        let context = ctx(concat!(
            "services:\n",
            "  web: {image: nginx, restart: always}\n",
            "  db: {image: postgres, restart: 'no'}\n",
        ));
        let out = engine.render_str(template, &context, "compose.yml").unwrap();
        insta::assert_snapshot!(out, @r"
        services:
          web:
            image: nginx
            restart: always
          db:
            image: postgres
            restart: no
        ");
    }
}
