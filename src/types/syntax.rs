/// The template syntax configuration.
///
/// Use [`Syntax::default()`] to get the default syntax configuration and
/// [`Syntax::builder()`] to create a custom syntax configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    pub(crate) patterns: Vec<(Kind, String)>,
}

/// A builder for the syntax configuration.
///
/// This struct is typically created using [`Syntax::builder()`].
#[derive(Debug, Clone)]
pub struct SyntaxBuilder<'a> {
    var: Option<(&'a str, &'a str)>,
    directive: Option<(&'a str, &'a str)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    BeginVar,
    EndVar,
    BeginDirective,
    EndDirective,
}

impl Default for Syntax {
    /// Returns the default syntax configuration.
    ///
    /// This is equivalent to the following.
    /// ```
    /// use mealdrive::Syntax;
    ///
    /// let syntax = Syntax::builder()
    ///     .var("${", "}")
    ///     .directive("&{", "}")
    ///     .build();
    /// assert_eq!(syntax, Syntax::default());
    /// ```
    #[inline]
    fn default() -> Self {
        Syntax::builder().var("${", "}").directive("&{", "}").build()
    }
}

impl Syntax {
    /// Create a new syntax builder.
    ///
    /// # Examples
    ///
    /// ```
    /// let syntax = mealdrive::Syntax::builder()
    ///     .var("<<", ">>")
    ///     .directive("<%", "%>")
    ///     .build();
    /// ```
    #[inline]
    pub fn builder<'a>() -> SyntaxBuilder<'a> {
        SyntaxBuilder::new()
    }

    /// Returns the pattern configured for the given kind.
    #[cfg(test)]
    pub(crate) fn pattern(&self, kind: Kind) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.as_str())
    }
}

impl<'a> SyntaxBuilder<'a> {
    /// Creates a new syntax builder.
    #[inline]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            var: None,
            directive: None,
        }
    }

    /// Set the variable reference syntax.
    ///
    /// If not set then variable references will not be available.
    ///
    /// # Panics
    ///
    /// If either of the strings are empty.
    #[inline]
    pub fn var(&mut self, begin_var: &'a str, end_var: &'a str) -> &mut Self {
        assert!(!begin_var.is_empty() && !end_var.is_empty());
        self.var = Some((begin_var, end_var));
        self
    }

    /// Set the directive syntax, used for `IF`, `IF NOT` and `ENDIF`.
    ///
    /// If not set then conditionals will not be available.
    ///
    /// # Panics
    ///
    /// If either of the strings are empty.
    #[inline]
    pub fn directive(&mut self, begin_directive: &'a str, end_directive: &'a str) -> &mut Self {
        assert!(!begin_directive.is_empty() && !end_directive.is_empty());
        self.directive = Some((begin_directive, end_directive));
        self
    }

    /// Builds the syntax configuration.
    ///
    /// # Panics
    ///
    /// If the variable and directive syntax share the same begin delimiter.
    pub fn build(&self) -> Syntax {
        if let (Some((v, _)), Some((d, _))) = (self.var, self.directive) {
            assert!(v != d, "variable and directive begin delimiters must differ");
        }
        let mut patterns = Vec::new();
        if let Some((begin, end)) = self.var {
            patterns.push((Kind::BeginVar, begin.into()));
            patterns.push((Kind::EndVar, end.into()));
        }
        if let Some((begin, end)) = self.directive {
            patterns.push((Kind::BeginDirective, begin.into()));
            patterns.push((Kind::EndDirective, end.into()));
        }
        Syntax { patterns }
    }
}

impl Kind {
    pub fn is_begin(&self) -> bool {
        matches!(self, Self::BeginVar | Self::BeginDirective)
    }

    /// Returns the closing kind for a begin kind.
    pub fn pair(&self) -> Self {
        match self {
            Self::BeginVar => Self::EndVar,
            Self::EndVar => Self::BeginVar,
            Self::BeginDirective => Self::EndDirective,
            Self::EndDirective => Self::BeginDirective,
        }
    }
}
