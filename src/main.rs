use minirel::buffer::{BufferPool, BufferPoolManager};
use minirel::storage::DiskManager;
use minirel::table::SimpleTable;

fn main() {
    env_logger::init();

    println!("Minirel - a disk-backed storage engine in Rust");
    println!("==============================================\n");

    let db_path = "demo.mrl";

    let disk = DiskManager::open(db_path).expect("Failed to open heap file");
    println!("Opened heap file: {}", db_path);

    let bufmgr = BufferPoolManager::new(disk, BufferPool::new(10));
    println!("Created buffer pool with 10 frames\n");

    let table = SimpleTable::create(&bufmgr, 1).expect("Failed to create table");
    println!("Created table at {}", table.meta_page_id());

    let records: &[&[&[u8]]] = &[
        &[b"z", b"Alice", b"Smith"],
        &[b"x", b"Bob", b"Johnson"],
        &[b"y", b"Charlie", b"Williams"],
        &[b"w", b"Dave", b"Miller"],
        &[b"v", b"Eve", b"Brown"],
    ];

    for record in records {
        table.insert(&bufmgr, record).expect("Failed to insert record");
        println!(
            "Inserted record with key {:?}",
            String::from_utf8_lossy(record[0])
        );
    }

    bufmgr.flush().expect("Failed to flush buffer pool");
    println!("\nFlushed dirty pages to disk");

    println!("\nFull scan, ordered by primary key:");
    for record in table.scan(&bufmgr).expect("Failed to scan table") {
        let fields: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        println!("  {}", fields.join(", "));
    }

    println!(
        "\nDisk stats: {} pages, {} reads, {} writes",
        bufmgr.disk().next_page_id(),
        bufmgr.disk().num_reads(),
        bufmgr.disk().num_writes()
    );

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
