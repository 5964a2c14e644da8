//! C function declaration parser.
//!
//! Parses single prototypes such as `int8_t int8_probe_unary(int8_t v)` or
//! `extern const char *copy(const char *v, int length);`. Type specifiers may
//! appear in any order (`long unsigned int`), `const` may appear anywhere,
//! and any pointer depth is accepted. Function pointers, arrays and
//! attributes are not.

use std::fmt;

use crate::error::{BridgeError, Result};

/// A C type as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CType {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    SizeT,
    IntPtr,
    UIntPtr,
    /// Pointer to another type.
    Pointer(Box<CType>),
    /// Const-qualified type.
    Const(Box<CType>),
    /// `struct name`, passed by value.
    Struct(String),
}

impl CType {
    pub fn is_void(&self) -> bool {
        matches!(self.strip_const(), CType::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.strip_const(), CType::Pointer(_))
    }

    /// Strip outer const qualifiers.
    pub fn strip_const(&self) -> &CType {
        match self {
            CType::Const(inner) => inner.strip_const(),
            other => other,
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CType::Pointer(inner) => return write!(f, "{inner}*"),
            CType::Const(inner) => return write!(f, "const {inner}"),
            CType::Struct(name) => return write!(f, "struct {name}"),
            CType::Void => "void",
            CType::Bool => "_Bool",
            CType::Char => "char",
            CType::SignedChar => "signed char",
            CType::UnsignedChar => "unsigned char",
            CType::Short => "short",
            CType::UnsignedShort => "unsigned short",
            CType::Int => "int",
            CType::UnsignedInt => "unsigned int",
            CType::Long => "long",
            CType::UnsignedLong => "unsigned long",
            CType::LongLong => "long long",
            CType::UnsignedLongLong => "unsigned long long",
            CType::Float => "float",
            CType::Double => "double",
            CType::LongDouble => "long double",
            CType::Int8 => "int8_t",
            CType::Int16 => "int16_t",
            CType::Int32 => "int32_t",
            CType::Int64 => "int64_t",
            CType::UInt8 => "uint8_t",
            CType::UInt16 => "uint16_t",
            CType::UInt32 => "uint32_t",
            CType::UInt64 => "uint64_t",
            CType::SizeT => "size_t",
            CType::IntPtr => "intptr_t",
            CType::UIntPtr => "uintptr_t",
        };
        f.write_str(name)
    }
}

/// A parsed C function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CParam {
    pub param_type: CType,
    /// Parameter name; empty when the declaration leaves it out.
    pub name: String,
}

/// A parsed C function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSignature {
    pub return_type: CType,
    pub name: String,
    /// Parameters, excluding a trailing `...`. A lone `(void)` yields none.
    pub parameters: Vec<CParam>,
    pub is_variadic: bool,
}

impl CSignature {
    /// Parse a C function declaration.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = lex(input)?;
        if tokens.is_empty() {
            return Err(invalid("empty signature"));
        }
        Parser { tokens, pos: 0 }.declaration()
    }

    /// Parameter types in declaration order.
    pub fn parameter_types(&self) -> impl Iterator<Item = &CType> {
        self.parameters.iter().map(|p| &p.param_type)
    }
}

impl fmt::Display for CSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param.param_type)?;
            if !param.name.is_empty() {
                write!(f, " {}", param.name)?;
            }
        }
        if self.is_variadic {
            if !self.parameters.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        if self.parameters.is_empty() && !self.is_variadic {
            f.write_str("void")?;
        }
        f.write_str(")")
    }
}

fn invalid(detail: impl Into<String>) -> BridgeError {
    BridgeError::InvalidSignature {
        detail: detail.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Star,
    Comma,
    LParen,
    RParen,
    Ellipsis,
    Semi,
}

fn lex(input: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            b'.' => {
                if input[i..].starts_with("...") {
                    tokens.push(Token::Ellipsis);
                    i += 3;
                } else {
                    return Err(invalid("stray '.'"));
                }
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                tokens.push(Token::Ident(&input[start..i]));
            }
            other => {
                return Err(invalid(format!("unexpected character '{}'", other as char)));
            }
        }
    }
    Ok(tokens)
}

/// Storage-class and function specifiers that do not affect the type.
const IGNORED_KEYWORDS: &[&str] = &["extern", "static", "inline", "__inline", "volatile", "restrict"];

/// Accumulated type specifiers before resolution to a [`CType`].
#[derive(Default)]
struct Specifiers {
    signedness: Option<bool>,
    short: bool,
    longs: u8,
    int: bool,
    char: bool,
    named: Option<CType>,
    is_const: bool,
    seen: bool,
}

impl Specifiers {
    fn resolve(self) -> Result<CType> {
        if !self.seen {
            return Err(invalid("expected type"));
        }
        let integer_words = self.signedness.is_some() || self.short || self.int || self.char;
        let ty = match self.named {
            Some(CType::Double) if self.longs == 1 && !integer_words => CType::LongDouble,
            Some(named) if self.longs == 0 && !integer_words => named,
            Some(named) => return Err(invalid(format!("conflicting specifiers for '{named}'"))),
            None if self.char => {
                if self.short || self.longs > 0 || self.int {
                    return Err(invalid("conflicting specifiers for 'char'"));
                }
                match self.signedness {
                    Some(true) => CType::SignedChar,
                    Some(false) => CType::UnsignedChar,
                    None => CType::Char,
                }
            }
            None if self.short => {
                if self.longs > 0 {
                    return Err(invalid("both 'short' and 'long'"));
                }
                if self.signedness == Some(false) {
                    CType::UnsignedShort
                } else {
                    CType::Short
                }
            }
            None => {
                let unsigned = self.signedness == Some(false);
                match (self.longs, unsigned) {
                    (0, false) => CType::Int,
                    (0, true) => CType::UnsignedInt,
                    (1, false) => CType::Long,
                    (1, true) => CType::UnsignedLong,
                    (2, false) => CType::LongLong,
                    (2, true) => CType::UnsignedLongLong,
                    _ => return Err(invalid("too many 'long' specifiers")),
                }
            }
        };
        Ok(if self.is_const {
            CType::Const(Box::new(ty))
        } else {
            ty
        })
    }
}

fn named_type(word: &str) -> Option<CType> {
    Some(match word {
        "void" => CType::Void,
        "float" => CType::Float,
        "double" => CType::Double,
        "_Bool" | "bool" => CType::Bool,
        "int8_t" => CType::Int8,
        "int16_t" => CType::Int16,
        "int32_t" => CType::Int32,
        "int64_t" => CType::Int64,
        "uint8_t" => CType::UInt8,
        "uint16_t" => CType::UInt16,
        "uint32_t" => CType::UInt32,
        "uint64_t" => CType::UInt64,
        "size_t" => CType::SizeT,
        "intptr_t" => CType::IntPtr,
        "uintptr_t" => CType::UIntPtr,
        _ => return None,
    })
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, want: Token<'static>, what: &str) -> Result<()> {
        match self.bump() {
            Some(t) if t == want => Ok(()),
            _ => Err(invalid(format!("missing {what}"))),
        }
    }

    fn declaration(mut self) -> Result<CSignature> {
        let base = self.specifiers()?;
        let return_type = self.pointers(base);
        let name = match self.bump() {
            Some(Token::Ident(name)) => name.to_string(),
            _ => return Err(invalid("missing function name")),
        };
        self.expect(Token::LParen, "'('")?;
        let (parameters, is_variadic) = self.parameters()?;
        self.expect(Token::RParen, "')'")?;
        if self.peek() == Some(Token::Semi) {
            self.pos += 1;
        }
        if self.pos != self.tokens.len() {
            return Err(invalid("trailing tokens after ')'"));
        }
        Ok(CSignature {
            return_type,
            name,
            parameters,
            is_variadic,
        })
    }

    fn specifiers(&mut self) -> Result<CType> {
        let mut spec = Specifiers::default();
        while let Some(Token::Ident(word)) = self.peek() {
            match word {
                w if IGNORED_KEYWORDS.contains(&w) => {}
                "const" => spec.is_const = true,
                "signed" | "unsigned" => {
                    if spec.signedness.is_some() {
                        return Err(invalid("repeated signedness specifier"));
                    }
                    spec.signedness = Some(word == "signed");
                }
                "short" => spec.short = true,
                "long" => spec.longs += 1,
                "int" => spec.int = true,
                "char" => spec.char = true,
                "struct" => {
                    self.pos += 1;
                    let name = match self.peek() {
                        Some(Token::Ident(name)) => name,
                        _ => return Err(invalid("expected struct name")),
                    };
                    if spec.named.is_some() {
                        return Err(invalid("more than one type name"));
                    }
                    spec.named = Some(CType::Struct(name.to_string()));
                }
                w => match named_type(w) {
                    Some(ty) if spec.named.is_none() => spec.named = Some(ty),
                    Some(_) => return Err(invalid("more than one type name")),
                    // First non-type identifier is the declarator name.
                    None => break,
                },
            }
            if word != "const" && !IGNORED_KEYWORDS.contains(&word) {
                spec.seen = true;
            }
            self.pos += 1;
        }
        spec.resolve()
    }

    /// Wrap `base` in one pointer layer per `*`; `* const` qualifiers are dropped.
    fn pointers(&mut self, mut base: CType) -> CType {
        loop {
            match self.peek() {
                Some(Token::Star) => base = CType::Pointer(Box::new(base)),
                Some(Token::Ident("const")) | Some(Token::Ident("restrict")) => {}
                _ => return base,
            }
            self.pos += 1;
        }
    }

    fn parameters(&mut self) -> Result<(Vec<CParam>, bool)> {
        let mut params = Vec::new();
        if self.peek() == Some(Token::RParen) {
            return Ok((params, false));
        }
        loop {
            if self.peek() == Some(Token::Ellipsis) {
                self.pos += 1;
                if self.peek() != Some(Token::RParen) {
                    return Err(invalid("'...' must be the last parameter"));
                }
                return Ok((params, true));
            }

            let base = self.specifiers()?;
            let param_type = self.pointers(base);
            let name = match self.peek() {
                Some(Token::Ident(name)) => {
                    self.pos += 1;
                    name.to_string()
                }
                _ => String::new(),
            };
            params.push(CParam { param_type, name });

            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RParen) => break,
                _ => return Err(invalid("expected ',' or ')' in parameter list")),
            }
        }

        // `(void)` means no parameters; `void` next to others is kept for
        // the marshal layer to reject.
        if params.len() == 1 && params[0].param_type == CType::Void && params[0].name.is_empty() {
            params.clear();
        }
        Ok((params, false))
    }
}
