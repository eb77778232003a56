use scraper::{ElementRef, Html, Selector};

/// One hyperlink pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRef {
    pub href: String,
    pub text: String,
}

/// One `<input>` element, named or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    /// Lowercased `type` attribute, `text` when absent.
    pub input_type: String,
    pub name: Option<String>,
    pub value: String,
}

/// A `<form>` with everything the classifier needs to judge it:
/// method, action, inputs in document order, how many options each
/// select offers, and the form's visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRef {
    /// Lowercased `method` attribute, `get` when absent.
    pub method: String,
    pub action: String,
    pub inputs: Vec<FormInput>,
    pub select_option_counts: Vec<usize>,
    pub text: String,
}

impl FormRef {
    pub fn is_post(&self) -> bool {
        self.method == "post"
    }
}

/// Queryable view of a parsed HTML body. Callers work with anchors,
/// forms, and text; the parser behind them is not part of the
/// interface.
pub struct HtmlDocument {
    doc: Html,
    anchor_sel: Selector,
    form_sel: Selector,
    input_sel: Selector,
    select_sel: Selector,
    option_sel: Selector,
}

impl HtmlDocument {
    /// Parses a document. Returns `None` when a structured view cannot
    /// be built; callers are expected to fall back to plain-text
    /// scanning in that case.
    pub fn parse(html: &str) -> Option<Self> {
        let doc = Html::parse_document(html);
        Some(HtmlDocument {
            doc,
            anchor_sel: Selector::parse("a[href]").ok()?,
            form_sel: Selector::parse("form").ok()?,
            input_sel: Selector::parse("input").ok()?,
            select_sel: Selector::parse("select").ok()?,
            option_sel: Selector::parse("option").ok()?,
        })
    }

    pub fn anchors(&self) -> Vec<AnchorRef> {
        self.doc
            .select(&self.anchor_sel)
            .filter_map(|el| {
                el.value().attr("href").map(|href| AnchorRef {
                    href: href.to_string(),
                    text: element_text(&el),
                })
            })
            .collect()
    }

    pub fn forms(&self) -> Vec<FormRef> {
        self.doc
            .select(&self.form_sel)
            .map(|form| {
                let inputs = form
                    .select(&self.input_sel)
                    .map(|input| FormInput {
                        input_type: input
                            .value()
                            .attr("type")
                            .unwrap_or("text")
                            .to_lowercase(),
                        name: input.value().attr("name").map(|n| n.to_string()),
                        value: input.value().attr("value").unwrap_or("").to_string(),
                    })
                    .collect();

                let select_option_counts = form
                    .select(&self.select_sel)
                    .map(|sel| sel.select(&self.option_sel).count())
                    .collect();

                FormRef {
                    method: form
                        .value()
                        .attr("method")
                        .unwrap_or("get")
                        .to_lowercase(),
                    action: form.value().attr("action").unwrap_or("").to_string(),
                    inputs,
                    select_option_counts,
                    text: element_text(&form),
                }
            })
            .collect()
    }

    pub fn visible_text(&self) -> String {
        self.doc.root_element().text().collect::<String>()
    }
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
