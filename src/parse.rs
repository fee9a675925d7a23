use serde_json::Value;

use crate::models::{
  FlatNode, NodeKey, ParseError, ParseOptions, ParsedDocument, ScalarValue, ValueType,
};

/// Parse raw JSON text into the flat node table.
///
/// Single pass over the input bytes: nodes come out in pre-order
/// depth-first order (a container before its children, children in source
/// order), each annotated with parent/depth/expandability metadata.
/// Duplicate object keys are accepted and emitted as distinct nodes; this
/// is a display tool over literal document structure, not a normalizer.
pub fn parse(raw: &str, options: &ParseOptions) -> Result<ParsedDocument, ParseError> {
  let mut parser = Parser::new(raw, options);
  parser.skip_bom();
  parser.skip_ws();
  if parser.at_end() {
    return Err(parser.error_here("empty input"));
  }
  parser.parse_value(None, None, 0)?;
  parser.skip_ws();
  if !parser.at_end() {
    return Err(parser.error_here("trailing characters after JSON value"));
  }
  let total_keys = parser.nodes.len() - 1;
  Ok(ParsedDocument {
    nodes: parser.nodes,
    total_keys,
    max_depth: parser.max_depth_seen,
  })
}

struct Parser<'a> {
  src: &'a str,
  bytes: &'a [u8],
  pos: usize,
  line: usize,
  column: usize,
  depth_limit: usize,
  max_depth_seen: usize,
  nodes: Vec<FlatNode>,
}

impl<'a> Parser<'a> {
  fn new(src: &'a str, options: &ParseOptions) -> Self {
    // Cap the pre-allocation: the hint is advisory and may be wild.
    let capacity = options.size_hint.unwrap_or(16).min(1 << 20);
    Self {
      src,
      bytes: src.as_bytes(),
      pos: 0,
      line: 1,
      column: 1,
      depth_limit: options.max_depth,
      max_depth_seen: 0,
      nodes: Vec::with_capacity(capacity),
    }
  }

  fn at_end(&self) -> bool {
    self.pos >= self.bytes.len()
  }

  fn peek(&self) -> Option<u8> {
    self.bytes.get(self.pos).copied()
  }

  /// Consume one byte. Columns count Unicode scalar values, so UTF-8
  /// continuation bytes do not advance the column.
  fn bump(&mut self) {
    let Some(b) = self.peek() else { return };
    self.pos += 1;
    if b == b'\n' {
      self.line += 1;
      self.column = 1;
    } else if b & 0xC0 != 0x80 {
      self.column += 1;
    }
  }

  /// 1-based position of the byte about to be read.
  fn error_here(&self, message: impl Into<String>) -> ParseError {
    ParseError {
      line: self.line,
      column: self.column,
      message: message.into(),
    }
  }

  fn skip_bom(&mut self) {
    if self.bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
      self.pos += 3;
    }
  }

  fn skip_ws(&mut self) {
    while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
      self.bump();
    }
  }

  fn push_node(
    &mut self,
    parent_id: Option<usize>,
    key: Option<NodeKey>,
    depth: usize,
    value_type: ValueType,
    value: Option<ScalarValue>,
  ) -> usize {
    let id = self.nodes.len();
    self.nodes.push(FlatNode {
      id,
      parent_id,
      key,
      depth,
      value_type,
      value,
      expandable: matches!(value_type, ValueType::Object | ValueType::Array),
      child_count: 0,
      last_child: false,
    });
    id
  }

  fn parse_value(
    &mut self,
    parent_id: Option<usize>,
    key: Option<NodeKey>,
    depth: usize,
  ) -> Result<usize, ParseError> {
    if depth > self.depth_limit {
      return Err(self.error_here("maximum nesting depth exceeded"));
    }
    if depth > self.max_depth_seen {
      self.max_depth_seen = depth;
    }
    match self.peek() {
      None => Err(self.error_here("unexpected end of input")),
      Some(b'{') => self.parse_object(parent_id, key, depth),
      Some(b'[') => self.parse_array(parent_id, key, depth),
      Some(b'"') => {
        let s = self.parse_string()?;
        Ok(self.push_node(
          parent_id,
          key,
          depth,
          ValueType::String,
          Some(ScalarValue::String(s)),
        ))
      }
      Some(b't') => {
        self.parse_keyword("true")?;
        Ok(self.push_node(
          parent_id,
          key,
          depth,
          ValueType::Boolean,
          Some(ScalarValue::Boolean(true)),
        ))
      }
      Some(b'f') => {
        self.parse_keyword("false")?;
        Ok(self.push_node(
          parent_id,
          key,
          depth,
          ValueType::Boolean,
          Some(ScalarValue::Boolean(false)),
        ))
      }
      Some(b'n') => {
        self.parse_keyword("null")?;
        Ok(self.push_node(parent_id, key, depth, ValueType::Null, Some(ScalarValue::Null)))
      }
      Some(b) if b == b'-' || b.is_ascii_digit() => {
        let n = self.parse_number()?;
        Ok(self.push_node(
          parent_id,
          key,
          depth,
          ValueType::Number,
          Some(ScalarValue::Number(n)),
        ))
      }
      Some(_) => Err(self.error_here("expected value")),
    }
  }

  fn parse_object(
    &mut self,
    parent_id: Option<usize>,
    key: Option<NodeKey>,
    depth: usize,
  ) -> Result<usize, ParseError> {
    let id = self.push_node(parent_id, key, depth, ValueType::Object, None);
    self.bump(); // '{'
    self.skip_ws();
    if self.peek() == Some(b'}') {
      self.bump();
      return Ok(id);
    }
    let mut count = 0;
    loop {
      self.skip_ws();
      if self.peek() != Some(b'"') {
        return Err(self.error_here("expected object key"));
      }
      let member_key = self.parse_string()?;
      self.skip_ws();
      if self.peek() != Some(b':') {
        return Err(self.error_here("expected ':' after object key"));
      }
      self.bump();
      self.skip_ws();
      let child = self.parse_value(Some(id), Some(NodeKey::Key(member_key)), depth + 1)?;
      count += 1;
      self.skip_ws();
      match self.peek() {
        Some(b',') => {
          self.bump();
        }
        Some(b'}') => {
          self.bump();
          self.nodes[child].last_child = true;
          break;
        }
        _ => return Err(self.error_here("expected ',' or '}' in object")),
      }
    }
    self.nodes[id].child_count = count;
    Ok(id)
  }

  fn parse_array(
    &mut self,
    parent_id: Option<usize>,
    key: Option<NodeKey>,
    depth: usize,
  ) -> Result<usize, ParseError> {
    let id = self.push_node(parent_id, key, depth, ValueType::Array, None);
    self.bump(); // '['
    self.skip_ws();
    if self.peek() == Some(b']') {
      self.bump();
      return Ok(id);
    }
    let mut count = 0;
    loop {
      self.skip_ws();
      let child = self.parse_value(Some(id), Some(NodeKey::Index(count)), depth + 1)?;
      count += 1;
      self.skip_ws();
      match self.peek() {
        Some(b',') => {
          self.bump();
        }
        Some(b']') => {
          self.bump();
          self.nodes[child].last_child = true;
          break;
        }
        _ => return Err(self.error_here("expected ',' or ']' in array")),
      }
    }
    self.nodes[id].child_count = count;
    Ok(id)
  }

  fn parse_keyword(&mut self, keyword: &'static str) -> Result<(), ParseError> {
    if self.src[self.pos..].starts_with(keyword) {
      for _ in 0..keyword.len() {
        self.bump();
      }
      Ok(())
    } else {
      Err(self.error_here(format!("expected `{keyword}`")))
    }
  }

  fn parse_string(&mut self) -> Result<String, ParseError> {
    self.bump(); // opening '"'
    let mut out = String::new();
    loop {
      let Some(b) = self.peek() else {
        return Err(self.error_here("unterminated string"));
      };
      match b {
        b'"' => {
          self.bump();
          return Ok(out);
        }
        b'\\' => {
          self.bump();
          let Some(esc) = self.peek() else {
            return Err(self.error_here("unterminated string"));
          };
          match esc {
            b'"' | b'\\' | b'/' => {
              out.push(esc as char);
              self.bump();
            }
            b'b' => {
              out.push('\u{0008}');
              self.bump();
            }
            b'f' => {
              out.push('\u{000C}');
              self.bump();
            }
            b'n' => {
              out.push('\n');
              self.bump();
            }
            b'r' => {
              out.push('\r');
              self.bump();
            }
            b't' => {
              out.push('\t');
              self.bump();
            }
            b'u' => {
              self.bump();
              let ch = self.parse_unicode_escape()?;
              out.push(ch);
            }
            _ => return Err(self.error_here("invalid escape sequence")),
          }
        }
        0x00..=0x1F => return Err(self.error_here("control character in string")),
        _ => {
          // Bulk-copy a run of plain characters.
          let start = self.pos;
          while let Some(b) = self.peek() {
            if b == b'"' || b == b'\\' || b < 0x20 {
              break;
            }
            self.bump();
          }
          out.push_str(&self.src[start..self.pos]);
        }
      }
    }
  }

  fn parse_hex4(&mut self) -> Result<u32, ParseError> {
    let mut code: u32 = 0;
    for _ in 0..4 {
      let Some(b) = self.peek() else {
        return Err(self.error_here("unterminated \\u escape"));
      };
      let digit = match b {
        b'0'..=b'9' => (b - b'0') as u32,
        b'a'..=b'f' => (b - b'a' + 10) as u32,
        b'A'..=b'F' => (b - b'A' + 10) as u32,
        _ => return Err(self.error_here("invalid hex digit in \\u escape")),
      };
      code = code * 16 + digit;
      self.bump();
    }
    Ok(code)
  }

  fn parse_unicode_escape(&mut self) -> Result<char, ParseError> {
    let first = self.parse_hex4()?;
    if (0xD800..=0xDBFF).contains(&first) {
      // A leading surrogate must be followed by `\uXXXX` with a trailer.
      if self.peek() != Some(b'\\') {
        return Err(self.error_here("lone leading surrogate in \\u escape"));
      }
      self.bump();
      if self.peek() != Some(b'u') {
        return Err(self.error_here("lone leading surrogate in \\u escape"));
      }
      self.bump();
      let second = self.parse_hex4()?;
      if !(0xDC00..=0xDFFF).contains(&second) {
        return Err(self.error_here("invalid low surrogate in \\u escape"));
      }
      let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
      return char::from_u32(combined).ok_or_else(|| self.error_here("invalid \\u escape"));
    }
    if (0xDC00..=0xDFFF).contains(&first) {
      return Err(self.error_here("lone trailing surrogate in \\u escape"));
    }
    char::from_u32(first).ok_or_else(|| self.error_here("invalid \\u escape"))
  }

  fn parse_number(&mut self) -> Result<f64, ParseError> {
    let start = self.pos;
    if self.peek() == Some(b'-') {
      self.bump();
    }
    match self.peek() {
      Some(b'0') => {
        self.bump();
      }
      Some(b'1'..=b'9') => {
        self.bump();
        while matches!(self.peek(), Some(b'0'..=b'9')) {
          self.bump();
        }
      }
      _ => return Err(self.error_here("expected digit in number")),
    }
    if self.peek() == Some(b'.') {
      self.bump();
      if !matches!(self.peek(), Some(b'0'..=b'9')) {
        return Err(self.error_here("expected digit after decimal point"));
      }
      while matches!(self.peek(), Some(b'0'..=b'9')) {
        self.bump();
      }
    }
    if matches!(self.peek(), Some(b'e' | b'E')) {
      self.bump();
      if matches!(self.peek(), Some(b'+' | b'-')) {
        self.bump();
      }
      if !matches!(self.peek(), Some(b'0'..=b'9')) {
        return Err(self.error_here("expected digit in exponent"));
      }
      while matches!(self.peek(), Some(b'0'..=b'9')) {
        self.bump();
      }
    }
    // The scanned slice matches the JSON number grammar, so parsing as a
    // double only fails on overflow, which rounds to infinity like any
    // other double arithmetic.
    self.src[start..self.pos]
      .parse::<f64>()
      .map_err(|_| self.error_here("invalid number"))
  }
}

/// Rebuild the nested `serde_json::Value` for the subtree rooted at `id`.
///
/// Duplicate object keys collapse here (map semantics); the flat table
/// itself always retains both entries.
pub fn subtree_value(nodes: &[FlatNode], id: usize) -> Option<Value> {
  let node = nodes.get(id)?;
  Some(build_value(nodes, node))
}

fn build_value(nodes: &[FlatNode], node: &FlatNode) -> Value {
  match node.value_type {
    ValueType::Object => {
      let mut map = serde_json::Map::new();
      for child in direct_children(nodes, node) {
        let key = child.key_string().unwrap_or_default();
        map.insert(key, build_value(nodes, child));
      }
      Value::Object(map)
    }
    ValueType::Array => Value::Array(
      direct_children(nodes, node)
        .map(|child| build_value(nodes, child))
        .collect(),
    ),
    _ => match &node.value {
      Some(ScalarValue::Null) | None => Value::Null,
      Some(ScalarValue::Boolean(b)) => Value::Bool(*b),
      Some(ScalarValue::Number(n)) => serde_json::Number::from_f64(*n)
        .map(Value::Number)
        .unwrap_or(Value::Null),
      Some(ScalarValue::String(s)) => Value::String(s.clone()),
    },
  }
}

/// Direct members of a container: scan its contiguous subtree slice and
/// keep the nodes one level down.
fn direct_children<'a>(
  nodes: &'a [FlatNode],
  node: &FlatNode,
) -> impl Iterator<Item = &'a FlatNode> {
  let depth = node.depth;
  let id = node.id;
  nodes[id + 1..]
    .iter()
    .take_while(move |n| n.depth > depth)
    .filter(move |n| n.parent_id == Some(id))
}

/// RFC 6901 JSON Pointer for a node (`""` addresses the root).
pub fn pointer_of(nodes: &[FlatNode], id: usize) -> Option<String> {
  let mut node = nodes.get(id)?;
  let mut segments: Vec<String> = Vec::new();
  while let Some(parent_id) = node.parent_id {
    let key = node.key.as_ref()?;
    segments.push(escape_pointer_token(&key.to_string()));
    node = nodes.get(parent_id)?;
  }
  if segments.is_empty() {
    return Some(String::new());
  }
  segments.reverse();
  Some(format!("/{}", segments.join("/")))
}

// JSON Pointer token escape (~0, ~1)
fn escape_pointer_token(raw: &str) -> String {
  raw.replace('~', "~0").replace('/', "~1")
}
