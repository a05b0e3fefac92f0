//! Visible signature widget: appearance stream, field, page and form wiring.

use super::SigningRequest;
use crate::config::SealConfig;
use crate::document::{PageInfo, PdfDocument};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::appearance::{appearance_stream, helvetica_font};
use crate::writer::{
    layout_label, unique_field_name, AcroFormBuilder, IncrementalUpdate, SignatureWidgetBuilder,
};

/// Objects queued by [`apply_annotation`].
#[derive(Debug, Clone)]
pub(crate) struct AppliedAnnotation {
    /// Reserved number of the signature dictionary (`/V` of the field)
    pub sig_ref: ObjectRef,
    /// Merged field/widget object
    pub widget_ref: ObjectRef,
    /// Partial field name after de-duplication
    pub field_name: String,
}

/// Queue the label appearance, the signature field and the page/catalog
/// updates that attach it.
pub(crate) fn apply_annotation(
    doc: &PdfDocument,
    update: &mut IncrementalUpdate<'_>,
    page: &PageInfo,
    request: &SigningRequest,
    config: &SealConfig,
) -> Result<AppliedAnnotation> {
    let rect = request.rect;

    let mut lines = vec![request.label_text.as_str()];
    if let Some(date) = request.date_text.as_deref() {
        lines.push(date);
    }
    let layout = layout_label(&lines, rect.width, rect.height, request.label_font_size, config.padding);
    if layout.font_size < request.label_font_size {
        log::debug!(
            "Label shrunk from {} to {} to fit {}x{}",
            request.label_font_size,
            layout.font_size,
            rect.width,
            rect.height
        );
    }

    let font_ref = update.reserve_id();
    let ap_ref = update.reserve_id();
    let sig_ref = update.reserve_id();
    let widget_ref = update.reserve_id();
    update.set_object(font_ref, helvetica_font());
    update.set_object(ap_ref, appearance_stream(&layout, &rect, font_ref));

    let catalog_ref = doc.catalog_ref()?;
    let mut catalog = doc.catalog()?;
    let (acro_form_ref, acro_form) = match catalog.get("AcroForm") {
        Some(Object::Reference(r)) => {
            let resolved = doc.resolve(*r)?;
            (Some(*r), resolved.as_dict().cloned().unwrap_or_default())
        },
        Some(Object::Dictionary(d)) => (None, d.clone()),
        _ => (None, Dictionary::new()),
    };
    let fields = match doc.get_resolved(&acro_form, "Fields")? {
        Some(Object::Array(fields)) => fields,
        _ => Vec::new(),
    };

    let existing_names = field_names(doc, &fields);
    let field_name = unique_field_name(&existing_names, &config.field_name);
    if field_name != config.field_name {
        log::info!("Field {} already exists, using {}", config.field_name, field_name);
    }

    let widget = SignatureWidgetBuilder::new(&field_name, rect)
        .with_page(page.obj_ref)
        .with_value(sig_ref)
        .with_appearance(ap_ref)
        .build();
    update.set_object(widget_ref, Object::Dictionary(widget));

    attach_to_page(doc, update, page, widget_ref)?;

    let mut builder = AcroFormBuilder::from_existing(acro_form, fields)
        .signatures_exist()
        .append_only();
    builder.add_field(widget_ref);
    let acro_form = builder.build();
    match acro_form_ref {
        Some(r) => update.set_object(r, Object::Dictionary(acro_form)),
        None => {
            catalog.insert("AcroForm".to_string(), Object::Dictionary(acro_form));
            update.set_object(catalog_ref, Object::Dictionary(catalog));
        },
    }

    Ok(AppliedAnnotation {
        sig_ref,
        widget_ref,
        field_name,
    })
}

/// Append the widget to the page's `/Annots`, rewriting whichever object
/// holds the array.
fn attach_to_page(
    doc: &PdfDocument,
    update: &mut IncrementalUpdate<'_>,
    page: &PageInfo,
    widget_ref: ObjectRef,
) -> Result<()> {
    let widget = Object::Reference(widget_ref);
    match page.dict.get("Annots") {
        Some(Object::Reference(annots_ref)) => {
            let mut annots = match doc.resolve(*annots_ref)? {
                Object::Array(a) => a,
                other => {
                    return Err(Error::InvalidPdf(format!(
                        "/Annots {} of page {} is a {}",
                        annots_ref,
                        page.index,
                        other.type_name()
                    )))
                },
            };
            annots.push(widget);
            update.set_object(*annots_ref, Object::Array(annots));
        },
        existing => {
            let mut annots = match existing {
                Some(Object::Array(a)) => a.clone(),
                _ => Vec::new(),
            };
            annots.push(widget);
            let mut dict = page.dict.clone();
            dict.insert("Annots".to_string(), Object::Array(annots));
            update.set_object(page.obj_ref, Object::Dictionary(dict));
        },
    }
    Ok(())
}

/// Partial names (`/T`) of the top-level fields.
fn field_names(doc: &PdfDocument, fields: &[Object]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|field| doc.resolve_object(field).ok())
        .filter_map(|field| field.as_dict().and_then(|d| d.get("T")).and_then(Object::as_text))
        .collect()
}
