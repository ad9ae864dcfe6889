use proc_macro::TokenStream;
use quote::quote;
use syn::{ItemFn, LitStr, parse_macro_input};

/// Wraps a function body so its wall-clock duration is logged at `info`
/// when it returns. The attribute argument overrides the log label;
/// the function name is the default.
pub fn timer_inner(attr: TokenStream, item: TokenStream) -> TokenStream {
    let func = parse_macro_input!(item as ItemFn);

    let label = if attr.is_empty() {
        func.sig.ident.to_string()
    } else {
        parse_macro_input!(attr as LitStr).value()
    };
    let label_lit = LitStr::new(&label, proc_macro2::Span::call_site());

    let attrs = &func.attrs;
    let vis = &func.vis;
    let sig = &func.sig;
    let block = &func.block;

    // Early `return`s inside the original body leave the closure, so the
    // elapsed line still gets written on every exit path.
    let expanded = quote! {
        #(#attrs)*
        #vis #sig {
            let __timer_started = std::time::Instant::now();
            let __timer_value = (move || #block)();
            log::info!(
                "{}: elapsed={:.2}s",
                #label_lit,
                __timer_started.elapsed().as_secs_f32()
            );
            __timer_value
        }
    };

    TokenStream::from(expanded)
}
