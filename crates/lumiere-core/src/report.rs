//! Clinical report documents.
//!
//! Two renderings of the same report:
//! - a template payload for the remote document generator
//! - a minimal single-page PDF built in memory, used when generation fails
//!
//! The minimal PDF is hand-assembled but structurally valid: every object
//! offset in the xref table and the `startxref` pointer are computed from
//! the emitted bytes.

use chrono::NaiveDate;
use serde::Serialize;

use crate::fallbacks::DEFAULT_REPORT_PRODUCT;
use crate::types::{AnalysisScores, Biomarker, Product};

/// Download name for generated reports.
pub const REPORT_FILENAME: &str = "Lumiere-Clinical-Report.pdf";

/// Scan identifier printed on reports: `LUM-` followed by six digits.
pub fn scan_id(seed: u64) -> String {
    format!("LUM-{:06}", 100_000 + seed % 900_000)
}

/// Values substituted into the document-generation template.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemplateData {
    pub report_date: String,
    pub scan_id: String,
    pub spots: u8,
    pub moisture: u8,
    pub texture: u8,
    pub circles: u8,
    pub products: String,
}

/// Request body for the remote document generator.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocGenPayload {
    pub template_data: TemplateData,
    pub html: String,
}

const REPORT_TEMPLATE: &str = r#"<html>
<body style="font-family: 'Helvetica', sans-serif; margin: 0; color: #1e293b;">
  <div style="background-color: #1e3a8a; padding: 40px; color: #ffffff; text-align: center;">
    <h1 style="margin: 0; font-size: 28px; letter-spacing: 4px; text-transform: uppercase;">Lumiere Clinical Diagnostics</h1>
    <p style="margin: 10px 0 0; font-size: 12px; letter-spacing: 2px;">Proprietary Dermal Analysis Report</p>
  </div>
  <div style="padding: 40px;">
    <p><strong>Scan ID: {{scan_id}}</strong> &middot; Diagnostic Date: {{report_date}}</p>
    <h2 style="font-size: 18px; color: #1e3a8a;">Biometric Breakdown</h2>
    <table style="width: 100%; margin-bottom: 40px;">
      <tr><td>MELANIN INDICES</td><td>{{spots}}%</td><td>HYDRATION LEVELS</td><td>{{moisture}}%</td></tr>
      <tr><td>DERMAL TEXTURE</td><td>{{texture}}%</td><td>VASCULAR TONE</td><td>{{circles}}%</td></tr>
    </table>
    <h2 style="font-size: 18px; color: #1e3a8a;">Prescribed Clinical Regimen</h2>
    <div>{{products}}</div>
    <p style="margin-top: 60px; font-size: 10px; color: #64748b;">
      This document is an AI-generated diagnostic report. All recommendations are based on proprietary dermal biomarker analysis.
    </p>
  </div>
  <div style="border-top: 5px solid #1e3a8a; padding: 20px; text-align: center; color: #94a3b8; font-size: 9px;">
    CONFIDENTIAL &bull; AUTHORIZED CLINICIANS ONLY &bull; LUMIERE AI BIOMETRICS
  </div>
</body>
</html>"#;

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{:.0}", price)
    } else {
        format!("{:.2}", price)
    }
}

/// Build the document-generation payload for a report.
pub fn docgen_payload(
    scores: &AnalysisScores,
    products: &[Product],
    scan_id: &str,
    date: NaiveDate,
) -> DocGenPayload {
    let product_blocks = products
        .iter()
        .map(|p| {
            format!(
                "<div style=\"margin-bottom: 10px; padding: 10px; border-left: 3px solid #2563eb; background: #f8fafc;\">\
                 <strong>{}</strong><br/><span>Retail Price: ${} | Target: {}</span></div>",
                escape_html(&p.name),
                format_price(p.price),
                escape_html(&p.target_issue)
            )
        })
        .collect::<Vec<_>>()
        .join("");

    DocGenPayload {
        template_data: TemplateData {
            report_date: date.format("%Y-%m-%d").to_string(),
            scan_id: scan_id.to_string(),
            spots: scores.spots,
            moisture: scores.moisture,
            texture: scores.texture,
            circles: scores.dark_circles,
            products: product_blocks,
        },
        html: REPORT_TEMPLATE.to_string(),
    }
}

/// Escape text for a PDF literal string. Non-ASCII becomes `?`.
fn pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

fn content_stream(scores: &AnalysisScores, products: &[Product], date: NaiveDate) -> String {
    let recommended = products
        .first()
        .map(|p| p.name.as_str())
        .unwrap_or(DEFAULT_REPORT_PRODUCT);

    let mut lines = vec![
        "BT".to_string(),
        "/F1 24 Tf 72 720 Td (Lumiere Clinical Diagnostics) Tj".to_string(),
        format!("/F1 12 Tf 0 -30 Td (Date: {}) Tj", date.format("%Y-%m-%d")),
    ];
    for biomarker in Biomarker::ALL {
        lines.push(format!(
            "0 -20 Td ({}: {}%) Tj",
            biomarker.label(),
            scores.get(biomarker)
        ));
    }
    lines.push(format!("0 -30 Td (Recommended: {}) Tj", pdf_text(recommended)));
    lines.push("0 -40 Td (CONFIDENTIAL - LUMIERE CLINIC WATERMARK [SECURED]) Tj".to_string());
    lines.push("ET".to_string());
    lines.join("\n")
}

/// Render a minimal single-page PDF 1.4 embedding the scores.
pub fn minimal_pdf(scores: &AnalysisScores, products: &[Product], date: NaiveDate) -> Vec<u8> {
    let stream = content_stream(scores, products, date);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", index + 1, body));
    }

    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    ));

    out.into_bytes()
}
