use colored::*;
use graw_core::{InvokeError, ReflectionError, ReflectionResult};
use std::fmt::Display;
use std::path::Path;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

/// Summary of a `reflect` run, optionally naming the directory the schemas were written to.
pub struct ReflectionSummary<'a>(pub &'a ReflectionResult, pub Option<&'a Path>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<InvokeError> for FormattedString {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::CallFailed(status) => FormattedString(format!(
                "{} code={:?} message={:?}",
                "gRPC Failed:".red().bold(),
                status.code(),
                status.message()
            )),
            err => FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err)),
        }
    }
}

impl From<ReflectionError> for FormattedString {
    fn from(err: ReflectionError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Reflection Failed:".red().bold(),
            err
        ))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<ReflectionSummary<'_>> for FormattedString {
    fn from(ReflectionSummary(result, out_dir): ReflectionSummary<'_>) -> Self {
        let mut out = FormattedString::from(ServiceList(result.services.clone())).0;

        let total: usize = result.schemas.iter().map(|schema| schema.len()).sum();
        out.push_str(&format!(
            "\n\n{} {} fragment(s), {} bytes",
            "Schemas:".cyan(),
            result.schemas.len(),
            total
        ));

        if let Some(dir) = out_dir {
            out.push_str(&format!("\n{} {}", "Written to:".cyan(), dir.display()));
        }

        FormattedString(out)
    }
}
