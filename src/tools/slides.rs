//! 幻灯片控制工具（封闭集合）
//!
//! 每个工具统一为 `(DeckController, 参数) -> 结果 JSON`；结果总带 status 字段，
//! 参数不合法或操作失败都返回 `{"status": "error", "message": ...}`，不会向上抛错。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::schema::parameters_schema;
use crate::tools::{DeckController, DeckError, ToolSpec};

/// 无参数工具
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// open_presentation 参数
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OpenPresentationArgs {
    /// Presentation file name with extension, e.g. "quarterly review.pdf"
    pub query: String,
}

/// open_slide 参数
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OpenSlideArgs {
    /// Slide number, starting from 1
    pub slide_number: i64,
}

/// 全部幻灯片工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideTool {
    ListPresentations,
    OpenPresentation,
    OpenSlide,
    NextSlide,
    PreviousSlide,
    ListSlides,
    ClosePresentation,
}

impl SlideTool {
    pub const ALL: [SlideTool; 7] = [
        SlideTool::ListPresentations,
        SlideTool::OpenPresentation,
        SlideTool::OpenSlide,
        SlideTool::NextSlide,
        SlideTool::PreviousSlide,
        SlideTool::ListSlides,
        SlideTool::ClosePresentation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SlideTool::ListPresentations => "list_presentations",
            SlideTool::OpenPresentation => "open_presentation",
            SlideTool::OpenSlide => "open_slide",
            SlideTool::NextSlide => "next_slide",
            SlideTool::PreviousSlide => "previous_slide",
            SlideTool::ListSlides => "list_slides",
            SlideTool::ClosePresentation => "close_presentation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            SlideTool::ListPresentations => "List presentation files available in the presentations directory.",
            SlideTool::OpenPresentation => "Open a presentation and start the slide show.",
            SlideTool::OpenSlide => "Show the slide with the given number in the open presentation.",
            SlideTool::NextSlide => "Go to the next slide of the open presentation.",
            SlideTool::PreviousSlide => "Go to the previous slide of the open presentation.",
            SlideTool::ListSlides => "List slide numbers with the text of each slide.",
            SlideTool::ClosePresentation => "Close the open presentation.",
        }
    }

    pub fn parameters_schema(&self) -> Value {
        match self {
            SlideTool::OpenPresentation => parameters_schema::<OpenPresentationArgs>(),
            SlideTool::OpenSlide => parameters_schema::<OpenSlideArgs>(),
            _ => parameters_schema::<NoArgs>(),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// 执行工具，永不失败：错误统一转为 status=error 的结果
    pub fn invoke(&self, deck: &mut DeckController, args: Value) -> Value {
        match self.run(deck, args) {
            Ok(payload) => payload,
            Err(message) => json!({ "status": "error", "message": message }),
        }
    }

    fn run(&self, deck: &mut DeckController, args: Value) -> Result<Value, String> {
        match self {
            SlideTool::ListPresentations => {
                self.parse::<NoArgs>(args)?;
                let files = deck.list_presentations().map_err(message)?;
                Ok(json!({ "status": "ok", "files": files }))
            }
            SlideTool::OpenPresentation => {
                let args: OpenPresentationArgs = self.parse(args)?;
                let opened = deck.open_presentation(&args.query).map_err(|e| match e {
                    DeckError::NotFound(_) | DeckError::UnsupportedFormat(_) => e.to_string(),
                    other => format!("failed to open {}: {other}", args.query),
                })?;
                Ok(json!({
                    "status": "ok",
                    "slides_count": opened.slides_count,
                    "presentation_name": opened.name,
                    "message": format!("Opened presentation {}", opened.name),
                }))
            }
            SlideTool::OpenSlide => {
                let args: OpenSlideArgs = self.parse(args)?;
                let slide = deck.open_slide(args.slide_number).map_err(message)?;
                Ok(json!({ "status": "ok", "slide_number": slide.number, "text": slide.text }))
            }
            SlideTool::NextSlide => {
                self.parse::<NoArgs>(args)?;
                let slide = deck.next_slide().map_err(message)?;
                Ok(json!({ "status": "ok", "slide_number": slide.number, "text": slide.text }))
            }
            SlideTool::PreviousSlide => {
                self.parse::<NoArgs>(args)?;
                let slide = deck.previous_slide().map_err(message)?;
                Ok(json!({ "status": "ok", "slide_number": slide.number, "text": slide.text }))
            }
            SlideTool::ListSlides => {
                self.parse::<NoArgs>(args)?;
                let slides: Vec<Value> = deck
                    .list_slides()
                    .map_err(message)?
                    .into_iter()
                    .map(|s| json!({ "number": s.number, "text": s.text }))
                    .collect();
                Ok(json!({ "status": "ok", "slides": slides }))
            }
            SlideTool::ClosePresentation => {
                self.parse::<NoArgs>(args)?;
                let name = deck.close_presentation().map_err(message)?;
                Ok(json!({ "status": "ok", "message": format!("Closed presentation {name}") }))
            }
        }
    }

    /// 参数校验：null 视为空对象
    fn parse<T: DeserializeOwned>(&self, args: Value) -> Result<T, String> {
        let args = if args.is_null() { json!({}) } else { args };
        serde_json::from_value(args).map_err(|e| format!("invalid arguments for {}: {e}", self.name()))
    }
}

fn message(e: DeckError) -> String {
    e.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{InMemoryLibrary, LoggingViewer};

    fn deck() -> DeckController {
        DeckController::new(
            InMemoryLibrary::new().with_deck("deck.pptx", ["Intro", "Agenda", "Results"]),
            LoggingViewer::new(),
        )
    }

    #[test]
    fn test_name_round_trip() {
        for tool in SlideTool::ALL {
            assert_eq!(SlideTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(SlideTool::from_name("search_rag"), None);
    }

    #[test]
    fn test_open_presentation_payload() {
        let mut d = deck();
        let out = SlideTool::OpenPresentation.invoke(&mut d, json!({"query": "deck.pptx"}));
        assert_eq!(out["status"], "ok");
        assert_eq!(out["presentation_name"], "deck.pptx");
        assert_eq!(out["slides_count"], 3);
    }

    #[test]
    fn test_open_slide_and_navigation_payloads() {
        let mut d = deck();
        SlideTool::OpenPresentation.invoke(&mut d, json!({"query": "deck.pptx"}));

        let out = SlideTool::OpenSlide.invoke(&mut d, json!({"slide_number": 2}));
        assert_eq!(out, json!({"status": "ok", "slide_number": 2, "text": "Agenda"}));

        let out = SlideTool::NextSlide.invoke(&mut d, json!({}));
        assert_eq!(out["slide_number"], 3);

        let out = SlideTool::NextSlide.invoke(&mut d, Value::Null);
        assert_eq!(out["status"], "error");

        let out = SlideTool::PreviousSlide.invoke(&mut d, json!({}));
        assert_eq!(out["slide_number"], 2);
    }

    #[test]
    fn test_schema_mismatch_is_error_payload() {
        let mut d = deck();
        SlideTool::OpenPresentation.invoke(&mut d, json!({"query": "deck.pptx"}));

        let out = SlideTool::OpenSlide.invoke(&mut d, json!({"slide_number": "two"}));
        assert_eq!(out["status"], "error");
        assert!(out["message"].as_str().unwrap().contains("invalid arguments for open_slide"));

        let out = SlideTool::NextSlide.invoke(&mut d, json!({"unexpected": 1}));
        assert_eq!(out["status"], "error");

        let out = SlideTool::OpenPresentation.invoke(&mut d, json!({}));
        assert_eq!(out["status"], "error");
    }

    #[test]
    fn test_list_slides_and_close() {
        let mut d = deck();
        assert_eq!(SlideTool::ListSlides.invoke(&mut d, json!({}))["status"], "error");
        SlideTool::OpenPresentation.invoke(&mut d, json!({"query": "deck.pptx"}));

        let out = SlideTool::ListSlides.invoke(&mut d, json!({}));
        assert_eq!(out["slides"][2], json!({"number": 3, "text": "Results"}));

        let out = SlideTool::ClosePresentation.invoke(&mut d, json!({}));
        assert_eq!(out["status"], "ok");
        assert_eq!(SlideTool::NextSlide.invoke(&mut d, json!({}))["message"], "no presentation is open");
    }

    #[test]
    fn test_specs_have_schemas() {
        let spec = SlideTool::OpenSlide.spec();
        assert_eq!(spec.name, "open_slide");
        assert!(spec.parameters["properties"]["slide_number"].is_object());
        let none = SlideTool::NextSlide.spec();
        assert_eq!(none.parameters["properties"], json!({}));
    }
}
