#![no_main]

use ganymede_transport::{
    BaseListTransport, CategoryTransport, ChunkReader, DumpResult, QueryResult,
};

use libfuzzer_sys::fuzz_target;

fuzz_target!(|buffer: String| {
    // Decoding arbitrary text may fail but must never panic
    let _ = CategoryTransport::from_buffer(buffer.clone()).tree();
    let _ = BaseListTransport::from_buffer(buffer.clone()).bases();

    let dump = DumpResult::from_buffer(buffer.clone());
    if let Ok(table) = dump.table() {
        for row in 0..table.len() {
            let _ = table.field_row(row);
        }
    }

    let result = QueryResult::from_buffer(buffer.clone());
    if let Ok(handles) = result.handles() {
        // Unpacked results are sorted by label, ignoring case
        let labels: Vec<String> = handles.iter().map(|h| h.label().to_lowercase()).collect();
        assert!(labels.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    // The token layer consumes every chunk it reports
    let mut reader = ChunkReader::new(&buffer);
    while reader.next_chunk().is_ok() {
        assert!(reader.position() <= buffer.len());
    }
});
