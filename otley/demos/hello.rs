use anyhow::Result;

use otley::btree::BTree;

fn main() -> Result<()> {
    let key = 42;
    let value = 3;

    let mut tree = BTree::create(std::path::Path::new("hello.db"))?;

    // Make sure we can't find 42 in our tree yet.
    assert_eq!(tree.search(key)?, None);

    // Insert 42 with a value of 3.
    tree.insert(key, value)?;

    // Make sure we can find it now.
    assert_eq!(tree.search(key)?, Some(value));

    tree.close();
    std::fs::remove_file("hello.db")?;
    Ok(())
}
