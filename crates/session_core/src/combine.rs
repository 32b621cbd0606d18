use std::collections::HashMap;

use regex::Regex;
use shared::{
    domain::{DomainVersionId, ViewModelId},
    error::LoadError,
};
use tracing::info;

use crate::{
    catalog::invalid_domain,
    namer::unique_layer_name,
    tabs::{OpenTabOptions, TabId},
    viewmodel::{AuxSources, ViewModel},
    SessionWorkspace,
};

/// Standalone lowercase letters in a score expression, deduplicated in order
/// of first appearance. Word-boundary matched, so `max` contributes nothing
/// while `a + max(b, c)` references a, b and c.
pub fn expression_variables(expression: &str) -> Vec<char> {
    let Ok(pattern) = Regex::new(r"\b[a-z]\b") else {
        return Vec::new();
    };
    let mut variables = Vec::new();
    for found in pattern.find_iter(expression) {
        if let Some(ch) = found.as_str().chars().next() {
            if !variables.contains(&ch) {
                variables.push(ch);
            }
        }
    }
    variables
}

/// True if the text is only letters a-z.
pub fn alphabetical(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|ch| ch.is_ascii_lowercase())
}

/// A parsed score expression over `+ - * / ( )`, numeric literals and
/// single-letter layer variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreExpression {
    root: Expr,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(char),
    Negate(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Multiply(Box<Expr>, Box<Expr>),
    Divide(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Variable(char),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

impl ScoreExpression {
    pub fn parse(source: &str) -> Result<Self, LoadError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(LoadError::expression("score expression is empty"));
        }
        let mut parser = Parser {
            tokens: &tokens,
            position: 0,
        };
        let root = parser.expression()?;
        if parser.position != tokens.len() {
            return Err(LoadError::expression(format!(
                "unexpected trailing input in score expression '{source}'"
            )));
        }
        Ok(Self { root })
    }

    /// Evaluate against one technique's scope of variable scores.
    pub fn evaluate(&self, scope: &HashMap<char, f64>) -> Result<f64, LoadError> {
        evaluate(&self.root, scope)
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, LoadError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            'a'..='z' => {
                chars.next();
                if matches!(chars.peek(), Some('a'..='z' | '0'..='9')) {
                    return Err(LoadError::expression(format!(
                        "unsupported identifier in score expression '{source}'"
                    )));
                }
                tokens.push(Token::Variable(ch));
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&digit) = chars.peek() {
                    if digit.is_ascii_digit() || digit == '.' {
                        literal.push(digit);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal.parse::<f64>().map_err(|_| {
                    LoadError::expression(format!("invalid number '{literal}' in score expression"))
                })?;
                tokens.push(Token::Number(number));
            }
            other => {
                return Err(LoadError::expression(format!(
                    "unexpected character '{other}' in score expression"
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl Parser<'_> {
    fn expression(&mut self) -> Result<Expr, LoadError> {
        let mut left = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.position += 1;
                    left = Expr::Add(Box::new(left), Box::new(self.term()?));
                }
                Token::Minus => {
                    self.position += 1;
                    left = Expr::Subtract(Box::new(left), Box::new(self.term()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, LoadError> {
        let mut left = self.factor()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.position += 1;
                    left = Expr::Multiply(Box::new(left), Box::new(self.factor()?));
                }
                Token::Slash => {
                    self.position += 1;
                    left = Expr::Divide(Box::new(left), Box::new(self.factor()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr, LoadError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.position += 1;
                Ok(Expr::Negate(Box::new(self.factor()?)))
            }
            Some(Token::Number(value)) => {
                self.position += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::Variable(ch)) => {
                self.position += 1;
                Ok(Expr::Variable(ch))
            }
            Some(Token::Open) => {
                self.position += 1;
                let inner = self.expression()?;
                match self.peek() {
                    Some(Token::Close) => {
                        self.position += 1;
                        Ok(inner)
                    }
                    _ => Err(LoadError::expression(
                        "unbalanced parentheses in score expression",
                    )),
                }
            }
            _ => Err(LoadError::expression(
                "score expression ended unexpectedly",
            )),
        }
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }
}

fn evaluate(expr: &Expr, scope: &HashMap<char, f64>) -> Result<f64, LoadError> {
    Ok(match expr {
        Expr::Number(value) => *value,
        Expr::Variable(ch) => *scope.get(ch).ok_or_else(|| {
            LoadError::expression(format!("Variable {ch} does not match any layers"))
        })?,
        Expr::Negate(inner) => -evaluate(inner, scope)?,
        Expr::Add(left, right) => evaluate(left, scope)? + evaluate(right, scope)?,
        Expr::Subtract(left, right) => evaluate(left, scope)? - evaluate(right, scope)?,
        Expr::Multiply(left, right) => evaluate(left, scope)? * evaluate(right, scope)?,
        Expr::Divide(left, right) => evaluate(left, scope)? / evaluate(right, scope)?,
    })
}

/// Inputs for one combination run: the expression, the target domain the
/// result should live in, and the layers supplying each auxiliary setting.
#[derive(Debug, Clone, Default)]
pub struct CombineRequest {
    pub expression: String,
    pub domain: Option<DomainVersionId>,
    pub aux: AuxSources,
}

impl SessionWorkspace {
    /// Check the score expression against the currently open tabs: every
    /// referenced variable must resolve to a data-bearing tab, and when a
    /// target domain is chosen every referenced layer must live in it.
    /// Returns the first violation as a human-readable message.
    ///
    /// The letter-to-tab binding is recomputed from live tab order here and
    /// again in [`Self::layer_by_operation`]; tabs may change in between.
    pub fn score_expression_error(
        &self,
        expression: &str,
        target_domain: Option<&DomainVersionId>,
    ) -> Option<String> {
        for variable in expression_variables(expression) {
            let Some(index) = self.tabs.char_to_index(variable) else {
                return Some(format!("Variable {variable} does not match any layers"));
            };
            if let Some(target) = target_domain {
                let tab_domain = self
                    .tabs
                    .iter()
                    .nth(index)
                    .and_then(|tab| tab.data_context)
                    .and_then(|vm| self.store.get(vm))
                    .and_then(|vm| vm.domain_version_id.clone());
                if tab_domain.as_ref() != Some(target) {
                    return Some(format!("Layer {variable} does not match the chosen domain"));
                }
            }
        }
        if let Err(err) = ScoreExpression::parse(expression) {
            return Some(err.to_string());
        }
        None
    }

    /// Layers currently living in the given domain, for the auxiliary-source
    /// pickers.
    pub fn layers_for_domain(&self, domain: &DomainVersionId) -> Vec<&ViewModel> {
        self.store.by_domain(domain)
    }

    /// Evaluate the score expression over the open layers and open the
    /// result as a new, closeable, non-replacing data tab. Fails without any
    /// tab mutation when a variable is unbound or the referenced layers span
    /// multiple domains.
    pub async fn layer_by_operation(
        &mut self,
        request: CombineRequest,
    ) -> Result<TabId, LoadError> {
        let expression = ScoreExpression::parse(&request.expression)?;

        // rebuild the letter binding from the live tab order
        let mut bindings: HashMap<char, ViewModelId> = HashMap::new();
        let mut binding_domains: Vec<DomainVersionId> = Vec::new();
        for variable in expression_variables(&request.expression) {
            let vm_id = self
                .tabs
                .char_to_index(variable)
                .and_then(|index| self.tabs.iter().nth(index))
                .and_then(|tab| tab.data_context)
                .ok_or_else(|| {
                    LoadError::expression(format!(
                        "Variable {variable} does not match any layers"
                    ))
                })?;
            if let Some(domain) = self
                .store
                .get(vm_id)
                .and_then(|vm| vm.domain_version_id.clone())
            {
                if !binding_domains.contains(&domain) {
                    binding_domains.push(domain);
                }
            }
            bindings.insert(variable, vm_id);
        }
        if binding_domains.len() > 1 {
            return Err(LoadError::expression(
                "cannot apply operations to layers of different domains",
            ));
        }

        let target = request
            .domain
            .or_else(|| binding_domains.into_iter().next())
            .ok_or_else(|| {
                LoadError::expression("score expression does not reference any layers")
            })?;
        let (identifier, version) = {
            let domain = self
                .catalog
                .get_domain(&target)
                .ok_or_else(|| invalid_domain(&target))?;
            (domain.identifier.clone(), domain.version.number.clone())
        };

        let name = unique_layer_name(self.store.names(), "layer by operation");
        let vm_id = self.store.layer_operation(
            &name,
            &identifier,
            &version,
            &expression,
            &bindings,
            &request.aux,
        )?;

        // hydrate only once the target domain's data is in
        let needs_data = self
            .catalog
            .get_domain(&target)
            .map(|domain| !domain.data_loaded)
            .unwrap_or(true);
        if needs_data {
            if let Err(err) = self.ensure_domains_loaded(&[target.clone()]).await {
                self.store.destroy(vm_id);
                return Err(err);
            }
        }
        if let Some(vm) = self.store.get_mut(vm_id) {
            vm.load_data();
            vm.update_gradient();
        }

        info!(layer = %name, expression = %request.expression, "combined layers");
        Ok(self.tabs.open_tab(
            OpenTabOptions {
                title: name,
                data: Some(vm_id),
                is_closeable: true,
                replace: false,
                force_new: true,
                is_data_table: true,
            },
            &mut self.store,
        ))
    }
}
