use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, LitStr, parse_macro_input, spanned::Spanned};

enum KvValue {
    Display,
    Len,
}

struct KvField {
    key: String,
    value: KvValue,
}

fn scan_kv_attrs(field: &Field, key: String) -> syn::Result<KvField> {
    let mut scanned = KvField {
        key,
        value: KvValue::Display,
    };

    for attr in &field.attrs {
        if !attr.path().is_ident("kv") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let lit: LitStr = meta.value()?.parse()?;
                scanned.key = lit.value();
                return Ok(());
            }
            if meta.path.is_ident("fmt") {
                let lit: LitStr = meta.value()?.parse()?;
                scanned.value = match lit.value().as_str() {
                    "display" => KvValue::Display,
                    "len" => KvValue::Len,
                    other => return Err(meta.error(format!("unsupported kv fmt mode: {other}"))),
                };
                return Ok(());
            }
            Err(meta.error("unsupported kv attribute; expected name/fmt"))
        })?;
    }

    Ok(scanned)
}

pub fn derive_kv_display_inner(item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    let struct_ident = input.ident.clone();

    let Data::Struct(data_struct) = &input.data else {
        return syn::Error::new(input.span(), "KvDisplay can only be derived for structs")
            .to_compile_error()
            .into();
    };

    let Fields::Named(fields) = &data_struct.fields else {
        return syn::Error::new(input.span(), "KvDisplay requires named fields")
            .to_compile_error()
            .into();
    };

    let mut scanned = Vec::new();
    for field in &fields.named {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        match scan_kv_attrs(field, field_ident.to_string()) {
            Ok(kv) => scanned.push((field_ident.clone(), kv)),
            Err(err) => return err.to_compile_error().into(),
        }
    }

    // One "\n\tkey = value" line per field, keys padded to the longest
    // one so the values line up.
    let longest = scanned.iter().map(|(_, kv)| kv.key.len()).max().unwrap_or(0);
    let mut format_text = String::new();
    let mut vals = Vec::new();
    for (field_ident, kv) in &scanned {
        format_text.push_str(&format!("\n\t{:<longest$} = {{}}", kv.key));
        vals.push(match kv.value {
            KvValue::Display => quote! { &self.#field_ident },
            KvValue::Len => quote! { &self.#field_ident.len() },
        });
    }
    let format_lit = LitStr::new(&format_text, Span::call_site());

    let expanded = quote! {
        impl std::fmt::Display for #struct_ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, #format_lit, #(#vals),*)
            }
        }
    };

    TokenStream::from(expanded)
}
