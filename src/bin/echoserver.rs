//! Renders everything the server learned about the request as an HTML page.

use std::io::Write;

use ember::config::Config;
use ember::{escape_html, logging, Log, Request, Response, StatusCode};

fn handle(req: &mut Request<'_>, res: &mut Response<'_>) -> anyhow::Result<()> {
    Log::new().append(&req.method).append(' ').append(&req.path);

    res.set_status(StatusCode::Ok)
        .set_content_type("text/html; charset=utf-8");

    res.append("<!doctype html>\n")?;
    res.append("<html>\n")?;
    res.append(" <head>\n")?;
    res.append("  <title>ember demo</title>\n")?;
    res.append(" </head>\n")?;
    res.append(" <body>\n")?;
    res.append("  <h1>ember demo</h1>\n")?;
    writeln!(res, "  <p>Your IP and port: {}</p>", req.client)?;
    writeln!(res, "  <p>Your request was of type {}</p>", escape_html(&req.method))?;
    writeln!(res, "  <p>Your request version was {}</p>", escape_html(&req.version))?;
    writeln!(res, "  <p>Your request path was {}</p>", escape_html(&req.path))?;

    res.append("  <p>Parameter:\n")?;
    res.append("   <ul>\n")?;
    for (key, value) in req.parameters.iter() {
        writeln!(res, "    <li>{} = {}</li>", escape_html(key), escape_html(value))?;
    }
    res.append("   </ul>\n")?;
    res.append("  </p>\n")?;

    res.append("  <p>Header fields:\n")?;
    res.append("   <ul>\n")?;
    for (key, value) in &req.fields {
        writeln!(res, "    <li>{} = {}</li>", escape_html(key), escape_html(value))?;
    }
    res.append("   </ul>\n")?;
    res.append("  </p>\n")?;
    res.append(" </body>\n")?;
    res.append("</html>\n")?;

    Ok(())
}

fn main() {
    logging::init();

    let cfg = Config::load();
    Log::new().append("Server started on port ").append(cfg.port);

    std::process::exit(ember::start(cfg.port, handle));
}
