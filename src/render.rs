//! Output of familiarity reports in various formats

use crate::{score::FamiliarityReport, text::Word, Count, Result};
use clap::ValueEnum;
use csv_async::AsyncWriterBuilder;
use std::fmt::Write as _;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Report formats
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// One word and its score per line
    Text,

    /// Tab-separated index, word, score and frequencies
    Tsv,

    /// Comma-separated index, word, score and frequencies
    Csv,

    /// HTML fragment where each word is tagged with a score class
    Html,

    /// Standalone HTML page with score details on each word
    FullHtml,
}

/// Write down the reports of a scored text
///
/// `words` and `reports` must come from the same text, in the same order.
pub async fn render<W>(
    format: OutputFormat,
    title: &str,
    words: &[Word<'_>],
    reports: &[FamiliarityReport],
    output: W,
) -> Result<()>
where
    W: AsyncWrite + Send + Unpin,
{
    assert_eq!(words.len(), reports.len(), "every word should have a report");
    if format == OutputFormat::Csv {
        return render_csv(words, reports, output).await;
    }

    let mut output = BufWriter::new(output);
    if format == OutputFormat::FullHtml {
        output.write_all(html_header(title).as_bytes()).await?;
    }
    for (idx, (word, report)) in words.iter().zip(reports).enumerate() {
        output
            .write_all(render_word(format, idx, word, report).as_bytes())
            .await?;
    }
    if format == OutputFormat::FullHtml {
        output
            .write_all(b"\n\t</p>\n</body>\n</html>\n")
            .await?;
    }
    output.flush().await?;
    Ok(())
}

/// Emit a CSV report
async fn render_csv<W>(words: &[Word<'_>], reports: &[FamiliarityReport], output: W) -> Result<()>
where
    W: AsyncWrite + Send + Unpin,
{
    let mut writer = AsyncWriterBuilder::new()
        .has_headers(false)
        .create_writer(output);
    for (idx, (word, report)) in words.iter().zip(reports).enumerate() {
        writer
            .write_record(&[
                idx.to_string(),
                display(word),
                report.score.to_string(),
                frequency(report.frequency_before),
                frequency(report.frequency_after),
            ])
            .await?;
    }
    writer.flush().await?;
    Ok(())
}

/// Emit the report of a single word in a line-oriented or HTML format
fn render_word(
    format: OutputFormat,
    idx: usize,
    word: &Word<'_>,
    report: &FamiliarityReport,
) -> String {
    let FamiliarityReport {
        frequency_before,
        frequency_after,
        score,
    } = *report;
    let mut out = String::new();
    match format {
        OutputFormat::Text => {
            let _ = writeln!(out, "{}\t{score}", display(word));
        }
        OutputFormat::Tsv => {
            let _ = writeln!(
                out,
                "{idx}\t{}\t{score}\t{}\t{}",
                display(word),
                frequency(frequency_before),
                frequency(frequency_after)
            );
        }
        OutputFormat::Html => {
            let fragment = word
                .fragment
                .as_deref()
                .map(|f| format!(" {}", escape(f)))
                .unwrap_or_default();
            let _ = write!(
                out,
                "<span class=\"ngram{}\">{}</span>{fragment} ",
                score_class(score),
                escape(word.text)
            );
        }
        OutputFormat::FullHtml => {
            let _ = write!(
                out,
                "<span class=\"ngram{} ngramPopup\">{}<span>Score:&nbsp;{score}<br>Frequency&nbsp;before:&nbsp;{}<br>Frequency&nbsp;after:&nbsp;{}</span></span> ",
                score_class(score),
                escape(&display(word)),
                frequency(frequency_before),
                frequency(frequency_after)
            );
        }
        OutputFormat::Csv => unreachable!("CSV output is handled by render_csv"),
    }
    if word.line_end && matches!(format, OutputFormat::Html | OutputFormat::FullHtml) {
        out.push_str("</p>\n<p>");
    }
    out
}

/// Word followed by its trailing fragment, if any
fn display(word: &Word<'_>) -> String {
    match &word.fragment {
        Some(fragment) => format!("{} {fragment}", word.text),
        None => word.text.to_owned(),
    }
}

/// Textual form of a frequency, `None` standing for an unknown word pair
fn frequency(frequency: Option<Count>) -> String {
    frequency.map_or_else(|| "None".to_owned(), |f| f.to_string())
}

/// CSS class suffix of a score
///
/// This is `(score + 9) / 10` rounded half to even, times ten, so that
/// stylesheets written for earlier reports keep working.
fn score_class(score: u8) -> u16 {
    let shifted = u16::from(score) + 9;
    let (tens, rest) = (shifted / 10, shifted % 10);
    let rounded = if rest > 5 || (rest == 5 && tens % 2 == 1) {
        tens + 1
    } else {
        tens
    };
    rounded * 10
}

/// Header of standalone HTML reports
fn html_header(title: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n\t<meta charset=\"utf-8\">\n\t<title>{}</title>\n\t<meta name=\"description\" content=\"Word familiarity report.\">\n\t<link rel=\"stylesheet\" href=\"ingram.css\">\n</head>\n<body>\n<p>",
        escape(title)
    )
}

/// Escape HTML special characters
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
