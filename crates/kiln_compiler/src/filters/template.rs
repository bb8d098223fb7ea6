//! A small `{{ … }}` template language.
//!
//! | Directive              | Expands to                                   |
//! |------------------------|----------------------------------------------|
//! | `{{ name }}`           | attribute of the item being compiled         |
//! | `{{ config.key }}`     | configuration value                          |
//! | `{{ yield }}`          | content being laid out                       |
//! | `{{ raw /id }}`        | raw content of another item                  |
//! | `{{ attr /id key }}`   | attribute of another item                    |
//! | `{{ path /id }}`       | output path of another item's default rep    |
//! | `{{ include /id }}`    | compiled content of another item's default rep |
//! | `{{ list pattern }}`   | identifiers of matching items, one per line  |

use kiln_common::Identifier;
use kiln_model::{Content, Document, ItemRep, Value};

use crate::filter::{Filter, FilterContext, FilterError, StepOutcome};
use crate::rules::Params;

/// Errors specific to template expansion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// A `{{` has no matching `}}`.
    #[error("unclosed directive at byte {0}")]
    Unclosed(usize),

    /// The directive is not recognised.
    #[error("unknown directive '{0}'")]
    UnknownDirective(String),

    /// The template itself is binary.
    #[error("template filter cannot run on binary content")]
    BinaryContent,

    /// `yield` outside of a layout step.
    #[error("'yield' used outside of a layout")]
    NothingToYield,

    /// A referenced item's content is binary.
    #[error("content of {0} is binary and cannot be inserted")]
    BinaryReference(String),
}

/// Expands `{{ … }}` directives.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFilter;

enum Expansion {
    Text(String),
    Needs(ItemRep),
}

impl Filter for TemplateFilter {
    fn run(
        &self,
        content: &Content,
        _params: &Params,
        ctx: &mut FilterContext<'_>,
    ) -> Result<StepOutcome, FilterError> {
        let text = content.as_text().ok_or(TemplateError::BinaryContent)?;
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while let Some(found) = text[pos..].find("{{") {
            let start = pos + found;
            out.push_str(&text[pos..start]);
            let body_start = start + 2;
            let end = text[body_start..]
                .find("}}")
                .ok_or(TemplateError::Unclosed(start))?;
            let directive = text[body_start..body_start + end].trim();
            match expand(directive, ctx)? {
                Expansion::Text(s) => out.push_str(&s),
                Expansion::Needs(rep) => return Ok(StepOutcome::NeedsRep(rep)),
            }
            pos = body_start + end + 2;
        }
        out.push_str(&text[pos..]);
        Ok(StepOutcome::Ready(Content::from(out)))
    }
}

fn render(value: Option<&Value>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

fn textual(content: &Content, what: &str) -> Result<String, TemplateError> {
    content
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| TemplateError::BinaryReference(what.to_string()))
}

fn is_attribute_name(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn expand(directive: &str, ctx: &mut FilterContext<'_>) -> Result<Expansion, FilterError> {
    let words: Vec<&str> = directive.split_whitespace().collect();
    let text = match words.as_slice() {
        ["yield"] => {
            let content = ctx.content_to_yield().ok_or(TemplateError::NothingToYield)?;
            textual(content, "the laid out content")?
        }
        [key] if key.starts_with("config.") => render(ctx.config_value(&key["config.".len()..])),
        ["raw", id] => {
            let id = Identifier::new(*id)?;
            textual(ctx.raw_content_of(&id)?, id.as_str())?
        }
        ["attr", id, key] => {
            let id = Identifier::new(*id)?;
            render(ctx.attribute_of(&id, key)?)
        }
        ["path", id] => {
            let rep = ItemRep::default_of(Identifier::new(*id)?);
            ctx.path_of(&rep)?.unwrap_or_default()
        }
        ["include", id] => {
            let rep = ItemRep::default_of(Identifier::new(*id)?);
            match ctx.compiled_content_of(&rep)? {
                Some(content) => textual(&content, rep.item.as_str())?,
                None => return Ok(Expansion::Needs(rep)),
            }
        }
        ["list", pattern] => ctx
            .find_items(pattern)?
            .iter()
            .map(Identifier::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        [name] if is_attribute_name(name) => render(ctx.item().attribute(name)),
        _ => return Err(TemplateError::UnknownDirective(directive.to_string()).into()),
    };
    Ok(Expansion::Text(text))
}
