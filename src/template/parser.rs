//! Builds the block tree from lexed segments.

use super::{
    TemplateError,
    expr::{self, Expr, Token},
    lexer::Segment,
};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Node {
    Text(String),
    Output(Expr),
    /// Execution region evaluated for its side effects.
    Eval(Expr),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    Each {
        seq: Expr,
        item: String,
        index: Option<String>,
        body: Vec<Node>,
    },
    Capture {
        name: Expr,
        body: Vec<Node>,
    },
}

enum BlockKind {
    /// `pending` is the condition guarding the body being collected;
    /// `None` once `else` has been seen.
    Cond {
        branches: Vec<(Expr, Vec<Node>)>,
        pending: Option<Expr>,
        unless: bool,
    },
    Each {
        seq: Expr,
        item: String,
        index: Option<String>,
    },
    Capture {
        name: Expr,
    },
}

struct Block {
    line: usize,
    kind: BlockKind,
    body: Vec<Node>,
}

impl Block {
    fn label(&self) -> &'static str {
        match &self.kind {
            BlockKind::Cond { unless: true, .. } => "unless",
            BlockKind::Cond { .. } => "if",
            BlockKind::Each { .. } => "each",
            BlockKind::Capture { .. } => "content_for",
        }
    }

    fn finish(self) -> Node {
        match self.kind {
            BlockKind::Cond {
                mut branches,
                pending,
                ..
            } => {
                let otherwise = match pending {
                    Some(cond) => {
                        branches.push((cond, self.body));
                        Vec::new()
                    }
                    None => self.body,
                };
                Node::If {
                    branches,
                    otherwise,
                }
            }
            BlockKind::Each { seq, item, index } => Node::Each {
                seq,
                item,
                index,
                body: self.body,
            },
            BlockKind::Capture { name } => Node::Capture {
                name,
                body: self.body,
            },
        }
    }
}

pub(super) fn parse(segments: Vec<Segment>) -> Result<Vec<Node>, TemplateError> {
    let mut builder = TreeBuilder::default();
    for segment in segments {
        match segment {
            Segment::Text(text) => builder.push(Node::Text(text)),
            Segment::Output { code, line } => builder.output(&code, line)?,
            Segment::Code { code, line } => builder.statement(&code, line)?,
        }
    }
    builder.finish()
}

#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    stack: Vec<Block>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(block) => block.body.push(node),
            None => self.root.push(node),
        }
    }

    fn output(&mut self, code: &str, line: usize) -> Result<(), TemplateError> {
        let tokens = expr::tokenize(code, line)?;
        if let Some((head, params)) = split_block_opener(&tokens) {
            return self.open_block(head, params, line);
        }
        let expr = expr::parse(&tokens, line)?;
        self.push(Node::Output(expr));
        Ok(())
    }

    fn statement(&mut self, code: &str, line: usize) -> Result<(), TemplateError> {
        let mut tokens = expr::tokenize(code, line)?;
        let keyword = match tokens.first() {
            None => return Ok(()),
            Some(Token::RBrace) => "end".to_owned(),
            Some(Token::Ident(name)) => name.clone(),
            Some(_) => String::new(),
        };

        match keyword.as_str() {
            "end" | "else" if tokens.len() > 1 => Err(TemplateError::syntax(
                line,
                format!("unexpected tokens after `{keyword}`"),
            )),
            "end" => self.close(line),
            "else" => self.else_branch(line),
            "if" | "unless" | "elsif" => {
                if tokens.last().is_some_and(|t| t.is_ident("then")) {
                    tokens.pop();
                }
                let cond = expr::parse(&tokens[1..], line)?;
                match keyword.as_str() {
                    "elsif" => self.elsif(cond, line),
                    "unless" => {
                        self.open(line, BlockKind::Cond {
                            branches: Vec::new(),
                            pending: Some(Expr::Not(Box::new(cond))),
                            unless: true,
                        });
                        Ok(())
                    }
                    _ => {
                        self.open(line, BlockKind::Cond {
                            branches: Vec::new(),
                            pending: Some(cond),
                            unless: false,
                        });
                        Ok(())
                    }
                }
            }
            _ => {
                if let Some((head, params)) = split_block_opener(&tokens) {
                    return self.open_block(head, params, line);
                }
                let expr = expr::parse(&tokens, line)?;
                self.push(Node::Eval(expr));
                Ok(())
            }
        }
    }

    fn open(&mut self, line: usize, kind: BlockKind) {
        self.stack.push(Block {
            line,
            kind,
            body: Vec::new(),
        });
    }

    /// `expr.each do |x|`, `expr.each_with_index do |x, i|`, `content_for :name do`.
    fn open_block(
        &mut self,
        head: &[Token],
        params: Vec<String>,
        line: usize,
    ) -> Result<(), TemplateError> {
        let kind = match expr::parse(head, line)? {
            Expr::Member(target, method) | Expr::Method { target, name: method, .. }
                if method == "each" || method == "each_with_index" =>
            {
                let with_index = method == "each_with_index";
                let mut params = params.into_iter();
                let (item, index) = match (params.next(), params.next(), params.next()) {
                    (Some(item), None, None) if !with_index => (item, None),
                    (Some(item), Some(index), None) if with_index => (item, Some(index)),
                    _ => {
                        let expected = if with_index { "|item, index|" } else { "|item|" };
                        return Err(TemplateError::syntax(
                            line,
                            format!("`{method}` block takes {expected}"),
                        ));
                    }
                };
                BlockKind::Each {
                    seq: *target,
                    item,
                    index,
                }
            }
            Expr::Call {
                name: function,
                mut args,
                kwargs,
            } if function == "content_for" && args.len() == 1 && kwargs.is_empty() => {
                if !params.is_empty() {
                    return Err(TemplateError::syntax(
                        line,
                        "`content_for` block takes no parameters",
                    ));
                }
                BlockKind::Capture {
                    name: args.remove(0),
                }
            }
            _ => return Err(TemplateError::syntax(line, "unsupported block expression")),
        };
        self.open(line, kind);
        Ok(())
    }

    fn elsif(&mut self, cond: Expr, line: usize) -> Result<(), TemplateError> {
        let Some(block) = self.stack.last_mut() else {
            return Err(TemplateError::syntax(line, "`elsif` without `if`"));
        };
        match &mut block.kind {
            BlockKind::Cond {
                branches,
                pending,
                unless: false,
            } if pending.is_some() => {
                if let Some(previous) = pending.replace(cond) {
                    branches.push((previous, std::mem::take(&mut block.body)));
                }
                Ok(())
            }
            _ => Err(TemplateError::syntax(line, "`elsif` without `if`")),
        }
    }

    fn else_branch(&mut self, line: usize) -> Result<(), TemplateError> {
        let Some(block) = self.stack.last_mut() else {
            return Err(TemplateError::syntax(line, "`else` without `if`"));
        };
        match &mut block.kind {
            BlockKind::Cond { branches, pending, .. } => match pending.take() {
                Some(cond) => {
                    branches.push((cond, std::mem::take(&mut block.body)));
                    Ok(())
                }
                None => Err(TemplateError::syntax(line, "duplicate `else`")),
            },
            _ => Err(TemplateError::syntax(line, "`else` without `if`")),
        }
    }

    fn close(&mut self, line: usize) -> Result<(), TemplateError> {
        let block = self
            .stack
            .pop()
            .ok_or_else(|| TemplateError::syntax(line, "`end` without an open block"))?;
        let node = block.finish();
        self.push(node);
        Ok(())
    }

    fn finish(self) -> Result<Vec<Node>, TemplateError> {
        match self.stack.last() {
            Some(block) => Err(TemplateError::syntax(
                block.line,
                format!("unterminated `{}` block", block.label()),
            )),
            None => Ok(self.root),
        }
    }
}

/// Split `head do |a, b|` (or `head { |a| `) into the head tokens and the
/// block parameters. `None` when the tokens do not open a block.
fn split_block_opener(tokens: &[Token]) -> Option<(&[Token], Vec<String>)> {
    let (last, rest) = tokens.split_last()?;
    if last.is_ident("do") || *last == Token::LBrace {
        return Some((rest, Vec::new()));
    }
    if *last != Token::Pipe {
        return None;
    }

    let open = rest.iter().rposition(|t| *t == Token::Pipe)?;
    let opener = open.checked_sub(1).and_then(|i| tokens.get(i))?;
    if !(opener.is_ident("do") || *opener == Token::LBrace) {
        return None;
    }

    let mut params = Vec::new();
    for (i, token) in rest[open + 1..].iter().enumerate() {
        match token {
            Token::Ident(name) if i % 2 == 0 => params.push(name.clone()),
            Token::Comma if i % 2 == 1 => {}
            _ => return None,
        }
    }
    Some((&tokens[..open - 1], params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::lexer::lex;
    use crate::value::Value;

    fn tree(src: &str) -> Vec<Node> {
        parse(lex(src).unwrap()).unwrap()
    }

    fn parse_err(src: &str) -> TemplateError {
        parse(lex(src).unwrap()).unwrap_err()
    }

    fn text(s: &str) -> Node {
        Node::Text(s.into())
    }

    fn var(name: &str) -> Expr {
        Expr::Var(name.into())
    }

    #[test]
    fn test_if_elsif_else() {
        let nodes = tree("<% if a %>A<% elsif b %>B<% else %>C<% end %>");
        assert_eq!(
            nodes,
            vec![Node::If {
                branches: vec![(var("a"), vec![text("A")]), (var("b"), vec![text("B")])],
                otherwise: vec![text("C")],
            }]
        );
    }

    #[test]
    fn test_unless_negates() {
        let nodes = tree("<% unless a %>x<% end %>");
        assert_eq!(
            nodes,
            vec![Node::If {
                branches: vec![(Expr::Not(Box::new(var("a"))), vec![text("x")])],
                otherwise: vec![],
            }]
        );
    }

    #[test]
    fn test_each_forms() {
        let expected = vec![Node::Each {
            seq: var("items"),
            item: "item".into(),
            index: None,
            body: vec![Node::Output(var("item"))],
        }];
        assert_eq!(tree("<% items.each do |item| %><%= item %><% end %>"), expected);
        assert_eq!(tree("<% items.each { |item| %><%= item %><% } %>"), expected);

        let nodes = tree("<% items.each_with_index do |item, i| %><% end %>");
        assert!(matches!(
            &nodes[0],
            Node::Each { index: Some(i), .. } if i == "i"
        ));
    }

    #[test]
    fn test_content_for_block() {
        let nodes = tree("<% content_for :head do %><style></style><% end %>");
        assert_eq!(
            nodes,
            vec![Node::Capture {
                name: Expr::Literal(Value::from("head")),
                body: vec![text("<style></style>")],
            }]
        );
        // output tag form captures the same way
        assert_eq!(tree("<%= content_for(:head) do %>x<% end %>").len(), 1);
    }

    #[test]
    fn test_nested_blocks() {
        let nodes = tree("<% if a %><% xs.each do |x| %><% if x %>y<% end %><% end %><% end %>");
        let Node::If { branches, .. } = &nodes[0] else {
            panic!("expected if");
        };
        let Node::Each { body, .. } = &branches[0].1[0] else {
            panic!("expected each");
        };
        assert!(matches!(body[0], Node::If { .. }));
    }

    #[test]
    fn test_plain_statement_is_eval() {
        assert_eq!(tree("<% helper 1 %>").len(), 1);
        assert!(matches!(tree("<% helper 1 %>")[0], Node::Eval(Expr::Call { .. })));
        assert!(tree("<% %>").is_empty());
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse_err("a\n<% if x %>\nbody");
        assert!(matches!(err, TemplateError::Syntax { line: 2, ref message } if message.contains("if")));
    }

    #[test]
    fn test_mismatched_keywords() {
        for src in [
            "<% end %>",
            "<% else %>",
            "<% elsif a %>",
            "<% if a %><% else %><% else %><% end %>",
            "<% unless a %><% elsif b %><% end %>",
            "<% xs.each do |a, b| %><% end %>",
            "<% xs.map do |a| %><% end %>",
        ] {
            assert!(
                matches!(parse(lex(src).unwrap()), Err(TemplateError::Syntax { .. })),
                "expected syntax error for {src:?}"
            );
        }
    }
}
