//! Derive macros for types that should opt out of state serialization.
//!
//! `FakeEncode` encodes nothing and `FakeDecode` decodes to `Default`. Used
//! for pure derived output (the framebuffer), which is cheaper to re-render
//! than to serialize.

use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

#[proc_macro_derive(FakeEncode)]
pub fn fake_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();
    let ident = &input.ident;

    quote! {
        impl #impl_generics ::bincode::Encode for #ident #type_generics #where_clause {
            fn encode<E: ::bincode::enc::Encoder>(
                &self,
                _encoder: &mut E,
            ) -> ::std::result::Result<(), ::bincode::error::EncodeError> {
                ::std::result::Result::Ok(())
            }
        }
    }
    .into()
}

#[proc_macro_derive(FakeDecode)]
pub fn fake_decode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let (_, type_generics, where_clause) = input.generics.split_for_impl();
    let ident = &input.ident;

    let mut decode_generics = input.generics.clone();
    decode_generics.params.insert(0, syn::parse_quote!(Context));
    let (decode_impl_generics, _, _) = decode_generics.split_for_impl();

    let mut borrow_generics = decode_generics.clone();
    borrow_generics.params.insert(0, syn::parse_quote!('de));
    let (borrow_impl_generics, _, _) = borrow_generics.split_for_impl();

    quote! {
        impl #decode_impl_generics ::bincode::Decode<Context> for #ident #type_generics #where_clause {
            fn decode<D: ::bincode::de::Decoder<Context = Context>>(
                _decoder: &mut D,
            ) -> ::std::result::Result<Self, ::bincode::error::DecodeError> {
                ::std::result::Result::Ok(Self::default())
            }
        }

        impl #borrow_impl_generics ::bincode::BorrowDecode<'de, Context> for #ident #type_generics #where_clause {
            fn borrow_decode<D: ::bincode::de::BorrowDecoder<'de, Context = Context>>(
                _decoder: &mut D,
            ) -> ::std::result::Result<Self, ::bincode::error::DecodeError> {
                ::std::result::Result::Ok(Self::default())
            }
        }
    }
    .into()
}
