use axum::response::Html;

/// Operator dashboard. Polls `/status` every 3 seconds and drives the job
/// through the same JSON endpoints a remote controller uses.
pub async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>StatScout</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #222; }
  h1 { font-size: 1.4rem; }
  .grid { display: grid; grid-template-columns: repeat(4, 1fr); gap: .75rem; margin: 1rem 0; }
  .card { border: 1px solid #ddd; border-radius: 6px; padding: .75rem; text-align: center; }
  .card b { display: block; font-size: 1.6rem; }
  .phase { font-weight: 600; text-transform: uppercase; }
  .phase.running, .phase.stopping { color: #b36b00; }
  .phase.completed { color: #217a3c; }
  .phase.failed { color: #b00020; }
  progress { width: 100%; height: 1rem; }
  button { padding: .5rem 1rem; margin-right: .5rem; cursor: pointer; }
  pre { background: #f6f6f6; padding: .75rem; border-radius: 6px; overflow-x: auto; }
  #error { color: #b00020; }
</style>
</head>
<body>
<h1>StatScout control</h1>
<p>Phase: <span id="phase" class="phase">-</span> &middot; Current: <span id="current">-</span></p>
<progress id="progress" value="0" max="1"></progress>
<div class="grid">
  <div class="card">Total<b id="total">0</b></div>
  <div class="card">Processed<b id="processed">0</b></div>
  <div class="card">Succeeded<b id="success">0</b></div>
  <div class="card">Failed<b id="fail">0</b></div>
</div>
<p id="error"></p>
<button onclick="check()">Check pending</button>
<button onclick="post('/start')">Start</button>
<button onclick="post('/stop')">Stop</button>
<pre id="output"></pre>
<script>
const $ = (id) => document.getElementById(id);

async function refresh() {
  try {
    const s = await (await fetch('/status')).json();
    $('phase').textContent = s.phase;
    $('phase').className = 'phase ' + s.phase;
    $('current').textContent = s.current_target || '-';
    $('total').textContent = s.total;
    $('processed').textContent = s.processed;
    $('success').textContent = s.success_count;
    $('fail').textContent = s.fail_count;
    $('progress').max = Math.max(s.total, 1);
    $('progress').value = s.processed;
    $('error').textContent = s.error || '';
  } catch (e) {
    $('error').textContent = 'status unavailable: ' + e;
  }
}

async function check() {
  const resp = await fetch('/check');
  $('output').textContent = JSON.stringify(await resp.json(), null, 2);
}

async function post(path) {
  const resp = await fetch(path, { method: 'POST' });
  $('output').textContent = JSON.stringify(await resp.json(), null, 2);
  refresh();
}

refresh();
setInterval(refresh, 3000);
</script>
</body>
</html>
"#;
