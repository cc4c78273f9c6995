//! Converts a BGL dictionary into an SDX dictionary.
//!
//! Usage: `cargo run --example bgl-to-sdx -- input.bgl output.ifo`
use glossa::{
    decode::{BglDecoder, DecodeEntry, DictMetadata},
    encode::SdxEncoder,
    Metadata,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        eprintln!("usage: bgl-to-sdx <input.bgl> <output.ifo>");
        std::process::exit(2);
    };
    let decoder = BglDecoder::from_file(&input)?;
    let source = decoder.metadata().clone();
    println!(
        "{}: {} entries, {} -> {}",
        source.title, source.num_entries, source.source_lang, source.target_lang
    );
    let metadata = Metadata::builder()
        .title(source.title)
        .author(source.author)
        .email(source.email)
        .description(source.description)
        .build();
    let mut encoder = SdxEncoder::new(&output, metadata);
    for entry in decoder.entries() {
        let entry = entry?;
        encoder.add_entry(entry.headword, entry.definition, &entry.alternates);
    }
    encoder.finish()?;
    Ok(())
}
