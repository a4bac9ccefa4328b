//! Typed locator descriptors.
//!
//! A [`Locator`] describes how to find an element (role and accessible name,
//! text, label, title, CSS, parent scope, filters, position) without touching
//! a page. The automation engine resolves it through the selector string from
//! [`Locator::selector`], which uses the engine's `internal:*` selector syntax.

use std::fmt;

use regex::RegexBuilder;

use crate::error::{Error, Result};

/// How a piece of text (accessible name, label, visible text) is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
	/// Case-insensitive substring, whitespace-normalized.
	Substring(String),
	/// Case-sensitive full match.
	Exact(String),
	/// Regular expression.
	Pattern { source: String, case_insensitive: bool },
}

impl TextMatch {
	pub fn exact(text: impl Into<String>) -> Self {
		TextMatch::Exact(text.into())
	}

	/// Compiles-checks `source` and wraps it as a pattern match.
	pub fn pattern(source: impl Into<String>, case_insensitive: bool) -> Result<Self> {
		let source = source.into();
		RegexBuilder::new(&source)
			.case_insensitive(case_insensitive)
			.build()
			.map_err(|e| Error::Config(format!("invalid locator pattern `{source}`: {e}")))?;
		Ok(TextMatch::Pattern {
			source,
			case_insensitive,
		})
	}

	/// Evaluates the match against element text the way the engine does.
	pub fn matches(&self, text: &str) -> bool {
		match self {
			TextMatch::Substring(needle) => normalize(text).to_lowercase().contains(&normalize(needle).to_lowercase()),
			TextMatch::Exact(expected) => normalize(text) == normalize(expected),
			TextMatch::Pattern {
				source,
				case_insensitive,
			} => RegexBuilder::new(source)
				.case_insensitive(*case_insensitive)
				.build()
				.is_ok_and(|re| re.is_match(text)),
		}
	}

	fn render(&self) -> String {
		match self {
			TextMatch::Substring(text) => format!("{}i", quote(text)),
			TextMatch::Exact(text) => format!("{}s", quote(text)),
			TextMatch::Pattern {
				source,
				case_insensitive,
			} => format!("/{}/{}", source.replace('/', "\\/"), if *case_insensitive { "i" } else { "" }),
		}
	}
}

impl From<&str> for TextMatch {
	fn from(text: &str) -> Self {
		TextMatch::Substring(text.to_string())
	}
}

impl From<String> for TextMatch {
	fn from(text: String) -> Self {
		TextMatch::Substring(text)
	}
}

fn normalize(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn quote(text: &str) -> String {
	serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

/// One step of a locator chain; each step searches inside the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
	Css(String),
	Role { role: String, name: Option<TextMatch> },
	Text(TextMatch),
	Label(TextMatch),
	Title(TextMatch),
	HasText(TextMatch),
	Nth(i32),
}

impl Step {
	fn render(&self) -> String {
		match self {
			Step::Css(css) => css.clone(),
			Step::Role { role, name: None } => format!("internal:role={role}"),
			Step::Role { role, name: Some(name) } => format!("internal:role={role}[name={}]", name.render()),
			Step::Text(m) => format!("internal:text={}", m.render()),
			Step::Label(m) => format!("internal:label={}", m.render()),
			Step::Title(m) => format!("internal:attr=[title={}]", m.render()),
			Step::HasText(m) => format!("internal:has-text={}", m.render()),
			Step::Nth(n) => format!("nth={n}"),
		}
	}
}

/// Element lookup descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
	steps: Vec<Step>,
}

impl Locator {
	fn start(step: Step) -> Self {
		Self { steps: vec![step] }
	}

	pub fn css(selector: impl Into<String>) -> Self {
		Self::start(Step::Css(selector.into()))
	}

	pub fn role(role: impl Into<String>) -> Self {
		Self::start(Step::Role {
			role: role.into(),
			name: None,
		})
	}

	pub fn text(text: impl Into<TextMatch>) -> Self {
		Self::start(Step::Text(text.into()))
	}

	pub fn label(text: impl Into<TextMatch>) -> Self {
		Self::start(Step::Label(text.into()))
	}

	pub fn title(text: impl Into<TextMatch>) -> Self {
		Self::start(Step::Title(text.into()))
	}

	/// Sets the accessible name when the last step is a role lookup.
	pub fn named(mut self, name: impl Into<TextMatch>) -> Self {
		if let Some(Step::Role { name: slot, .. }) = self.steps.last_mut() {
			*slot = Some(name.into());
		}
		self
	}

	/// Narrows to `inner` elements found inside elements matched by `self`.
	///
	/// `css("#nav").locator(role("link"))` is a link inside `#nav`.
	pub fn locator(mut self, inner: Locator) -> Self {
		self.steps.extend(inner.steps);
		self
	}

	/// Keeps only elements whose text matches.
	pub fn has_text(mut self, text: impl Into<TextMatch>) -> Self {
		self.steps.push(Step::HasText(text.into()));
		self
	}

	/// Picks the n-th match (0-based, negative counts from the end).
	pub fn nth(mut self, index: i32) -> Self {
		self.steps.push(Step::Nth(index));
		self
	}

	pub fn first(self) -> Self {
		self.nth(0)
	}

	pub fn steps(&self) -> &[Step] {
		&self.steps
	}

	/// Selector string understood by the automation engine.
	pub fn selector(&self) -> String {
		self.steps.iter().map(Step::render).collect::<Vec<_>>().join(" >> ")
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.selector())
	}
}

/// Checkbox enabling a data layer in the layer drawer.
///
/// The drawer row's text reads `Check` + `Layer color` + name + `Layer filtering`.
pub fn data_layer_checkbox(layer: &str) -> Result<Locator> {
	let pattern = TextMatch::pattern(format!("^CheckLayer color{}Layer filtering$", regex::escape(layer)), true)?;
	Ok(Locator::css("div").has_text(pattern).locator(Locator::label("Check")))
}

/// Checkbox selecting a saved AOI by exact name in the Saved AOIs list.
pub fn saved_aoi_checkbox(aoi: &str) -> Result<Locator> {
	let pattern = TextMatch::pattern(format!("^Check{}$", regex::escape(aoi)), false)?;
	Ok(Locator::css("div").has_text(pattern).locator(Locator::label("Check")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_role_with_name_modes() {
		assert_eq!(
			Locator::role("button").named("Saved AOIs").selector(),
			r#"internal:role=button[name="Saved AOIs"i]"#
		);
		assert_eq!(
			Locator::role("button").named(TextMatch::exact("Delete")).selector(),
			r#"internal:role=button[name="Delete"s]"#
		);
		assert_eq!(Locator::role("checkbox").nth(1).selector(), "internal:role=checkbox >> nth=1");
	}

	#[test]
	fn renders_scoped_chain() {
		let landmark = Locator::css("#navbarToggle").locator(Locator::role("link").named("Map"));
		assert_eq!(landmark.selector(), r#"#navbarToggle >> internal:role=link[name="Map"i]"#);
	}

	#[test]
	fn quotes_are_escaped() {
		let loc = Locator::text(r#"say "hi""#);
		assert_eq!(loc.selector(), r#"internal:text="say \"hi\""i"#);
	}

	#[test]
	fn title_uses_attribute_selector() {
		assert_eq!(
			Locator::title("Change AOI creation tool").selector(),
			r#"internal:attr=[title="Change AOI creation tool"i]"#
		);
	}

	#[test]
	fn named_ignores_non_role_steps() {
		assert_eq!(Locator::css("div").named("x"), Locator::css("div"));
	}

	#[test]
	fn data_layer_locator_escapes_layer_name() {
		let loc = data_layer_checkbox("Elevation (DEM)").unwrap();
		assert_eq!(
			loc.selector(),
			r#"div >> internal:has-text=/^CheckLayer colorElevation \(DEM\)Layer filtering$/i >> internal:label="Check"i"#
		);

		let Step::HasText(filter) = &loc.steps()[1] else {
			panic!("expected has-text filter");
		};
		assert!(filter.matches("CheckLayer colorelevation (dem)Layer filtering"));
		assert!(!filter.matches("CheckLayer colorElevation DEMLayer filtering"));
	}

	#[test]
	fn saved_aoi_locator_is_anchored_and_case_sensitive() {
		let loc = saved_aoi_checkbox("HLZ_TEST_AOI").unwrap();
		let Step::HasText(filter) = &loc.steps()[1] else {
			panic!("expected has-text filter");
		};
		assert!(filter.matches("CheckHLZ_TEST_AOI"));
		assert!(!filter.matches("CheckHLZ_TEST_AOI_2"));
		assert!(!filter.matches("checkhlz_test_aoi"));
	}

	#[test]
	fn text_match_semantics() {
		assert!(TextMatch::from("continue to").matches("Continue   to application"));
		assert!(TextMatch::exact("Map").matches(" Map "));
		assert!(!TextMatch::exact("Map").matches("Maps"));
		assert!(TextMatch::pattern("a/b", false).unwrap().render().contains("a\\/b"));
		assert!(TextMatch::pattern("(", false).is_err());
	}
}
