//! Plain text summary of a bookmark document.

use viewmark_core::config::Config;
use viewmark_core::lens::LensUnit;
use viewmark_core::snapshot::PerspectiveData;
use viewmark_core::store::{SavedView, SavedViewStore};
use viewmark_core::RememberMask;

pub struct Report<'a> {
    path: &'a std::path::Path,
    store: &'a SavedViewStore,
    lens_unit: LensUnit,
}
impl<'a> Report<'a> {
    #[must_use]
    pub fn new(path: &'a std::path::Path, store: &'a SavedViewStore, config: &Config) -> Self {
        Self {
            path,
            store,
            lens_unit: config.default_lens_unit,
        }
    }
}

fn categories(mask: RememberMask) -> String {
    if mask.is_empty() {
        return "nothing".to_owned();
    }
    mask.categories()
        .map(|category| category.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn lens(perspective: &PerspectiveData, unit: LensUnit) -> String {
    match unit {
        LensUnit::FieldOfView => format!("{:.1} deg", perspective.field_of_view.to_degrees()),
        LensUnit::FocalLength => format!("{:.1} mm", perspective.focal_length),
    }
}

/// Things about a view worth pointing out.
fn problems(view: &SavedView) -> Vec<String> {
    let mut problems = Vec::new();
    let never_captured = view.mask() - view.snapshot().present();
    if !never_captured.is_empty() {
        problems.push(format!(
            "remembers {} but never captured it",
            categories(never_captured)
        ));
    }
    if let Some(Err(e)) = view.snapshot().perspective.as_ref().map(PerspectiveData::validate) {
        problems.push(format!("perspective is invalid: {e}"));
    }
    problems
}

impl std::fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}: {} saved views", self.path.display(), self.store.len())?;
        for view in self.store.iter() {
            write!(
                f,
                "  {:>3}. {} {:?} [{}]",
                view.order(),
                view.id(),
                view.name(),
                categories(view.mask())
            )?;
            if let Some(perspective) = view.snapshot().perspective.as_ref() {
                write!(f, " lens {}", lens(perspective, self.lens_unit))?;
            }
            writeln!(f, ", modified {}", view.modified())?;
            for problem in problems(view) {
                log::warn!("{}: {}", view.id(), problem);
                writeln!(f, "       ! {problem}")?;
            }
        }
        Ok(())
    }
}
